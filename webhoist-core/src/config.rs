use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Largest file the commit-based publisher will upload (100 MiB).
pub const MAX_PAGES_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
/// Largest object the bucket publisher will upload (1 GiB).
pub const MAX_BUCKET_FILE_SIZE_BYTES: u64 = 1024 * 1024 * 1024;
/// Branch the published revision history lives on.
pub const PUBLISH_BRANCH: &str = "main";
/// TTL applied to every record the publishers emit.
pub const RECORD_TTL_SECONDS: i64 = 300;
/// Upper bound on concurrent blob uploads within one revision.
pub const DEFAULT_BLOB_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum TargetError {
    /// The full domain must be a subdomain of a registrable base domain,
    /// i.e. carry at least two dots (`site.example.com`).
    #[error("`{0}` is not a subdomain of a registrable base domain")]
    NotASubdomain(String),
    #[error("content folder path must not be empty")]
    EmptyFolder,
}

/// Where content goes: the full domain the site will serve on and the local
/// folder holding the content. Built once per run from CLI input; immutable.
#[derive(Debug, Clone)]
pub struct PublishTarget {
    domain: String,
    folder: PathBuf,
}

impl PublishTarget {
    pub fn new(domain: &str, folder: &Path) -> Result<Self, TargetError> {
        if domain.matches('.').count() < 2 {
            return Err(TargetError::NotASubdomain(domain.to_string()));
        }
        if folder.as_os_str().is_empty() {
            return Err(TargetError::EmptyFolder);
        }
        info!(domain, folder = %folder.display(), "Resolved publish target");
        Ok(Self {
            domain: domain.to_string(),
            folder: folder.to_path_buf(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// All suffixes of `domain` that could be the registrable base domain,
/// longest first. `www.site.example.com` yields `site.example.com` and
/// `example.com`. The caller picks one; with a single candidate the choice
/// is forced.
pub fn base_domain_candidates(domain: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut rest = domain;
    while let Some(idx) = rest.find('.') {
        rest = &rest[idx + 1..];
        if rest.contains('.') {
            candidates.push(rest.to_string());
        }
    }
    candidates
}
