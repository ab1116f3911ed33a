//! Error taxonomy shared across the publishing pipeline.
//!
//! Providers surface [`ProviderError`]; the pipeline layers wrap those in
//! [`PublishError`], [`DnsError`] and [`DeployError`] so a failure always
//! carries the step it happened in.

use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure returned by a provider capability call (repo host, object store,
/// CDN, certificate authority, DNS backend).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Bad or missing credentials. Fatal, not retryable.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The addressed entity does not exist. Handled explicitly per call site;
    /// a miss can be a valid "go ahead and create" signal.
    #[error("not found: {0}")]
    NotFound(String),
    /// The namespace or resource is already taken.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A compare-and-swap ref update observed a stale prior revision.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),
    /// Transient network or service fault, surfaced verbatim.
    #[error("backend error: {0}")]
    Backend(#[source] BoxError),
}

impl ProviderError {
    pub fn backend(source: impl Into<BoxError>) -> Self {
        ProviderError::Backend(source.into())
    }
}

/// Fatal failures of the file collector. Per-entry walk errors are skipped,
/// only problems with the root itself abort the collection.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("cannot read root folder {path:?}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path {0:?} is not a directory")]
    NotADirectory(PathBuf),
}

/// One file that could not be turned into a blob.
#[derive(Debug)]
pub struct BlobFailure {
    pub path: String,
    pub reason: String,
}

/// Failures of the publishing side of the pipeline (upload and provisioning).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Collect(#[from] CollectError),
    /// Blob creation failed for one or more files. All failures are
    /// collected and the whole revision is aborted; nothing is committed.
    #[error("blob creation failed for {} file(s)", .errors.len())]
    Blobs { errors: Vec<BlobFailure> },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A provisioning step failed; the sequence stops there. Effects of
    /// earlier steps are left in place for the operator to clean up.
    #[error("provisioning step `{step}` failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: ProviderError,
    },
    #[error("required DNS records are not available before provisioning completed")]
    RecordsNotReady,
    #[error("publish cancelled")]
    Cancelled,
}

/// Failures of the DNS reconciliation side.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("no hosted zone matches base domain `{0}`")]
    ZoneNotFound(String),
    #[error("refusing to upsert an empty record set")]
    EmptyRecordSet,
    /// The atomic change batch was rejected; either all records land or none.
    #[error("record batch was not applied: {source}")]
    BatchApply {
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Top-level deployment failure, naming the pipeline step that broke.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("deployment step `{step}` failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("namespace `{0}` is already taken")]
    NamespaceTaken(String),
    #[error("hosted zone for base domain `{0}` not found")]
    ZoneMissing(String),
    #[error("deployment cancelled before step `{0}`")]
    Cancelled(&'static str),
}

pub(crate) fn step_failure(
    step: &'static str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> DeployError {
    DeployError::Step {
        step,
        source: Box::new(source),
    }
}
