//! Incremental, content-addressable revision construction.
//!
//! Turns a collected file set plus the branch's current head into a new
//! immutable revision: blobs for every file, a tree layered over the prior
//! head's tree, a commit parented on that head, and a guarded fast-forward
//! ref update. Content addressing on the backend gives deduplication for
//! free: republishing unchanged files creates no new blobs.
//!
//! All blob failures in one invocation are collected and the whole build
//! aborts without committing anything; a partially built revision is never
//! exposed as a ref target.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collect::FileEntry;
use crate::contract::{BlobEncoding, RepoStore, TreeEntry, BLOB_MODE};
use crate::error::{BlobFailure, PublishError};

/// Policy-special path: the published target always carries a marker file
/// binding it to the custom domain. Its content is forced to the target
/// domain, overwriting whatever the folder contains.
pub const CNAME_FILE: &str = "CNAME";

/// Commit message used for every published revision.
pub const COMMIT_MESSAGE: &str = "Publish site content";

/// Addresses one repository on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

/// The revision that was accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRevision {
    pub commit_sha: String,
    pub tree_sha: String,
    pub parent_sha: Option<String>,
    /// Number of tree entries, the synthesized domain marker included.
    pub blob_count: usize,
}

/// Builds and publishes one revision of `entries` onto `branch`.
///
/// Blob uploads run concurrently, bounded by `concurrency`, and the tree is
/// only assembled after every blob operation has completed. Cancellation is
/// honored before the blob batch and again before the ref update, so an
/// aborted run never moves the branch.
pub async fn publish_revision<R: RepoStore + ?Sized>(
    store: &R,
    repo: &RepoId,
    domain: &str,
    branch: &str,
    entries: &[FileEntry],
    cancel: &CancellationToken,
    concurrency: usize,
) -> Result<BuiltRevision, PublishError> {
    let owner = repo.owner.as_str();
    let name = repo.name.as_str();

    let prior = store.get_ref(owner, name, branch).await?;
    let (base_tree, parents) = match &prior {
        Some(head) => {
            let head_commit = store.get_commit(owner, name, &head.sha).await?;
            debug!(head = %head.sha, base_tree = %head_commit.tree_sha, "Building against prior head");
            (Some(head_commit.tree_sha), vec![head.sha.clone()])
        }
        None => {
            debug!(branch, "No prior head; this is the first publish");
            (None, Vec::new())
        }
    };

    if cancel.is_cancelled() {
        return Err(PublishError::Cancelled);
    }

    info!(files = entries.len(), concurrency, "Creating content blobs");
    let has_cname = entries.iter().any(|e| e.relative_path == CNAME_FILE);
    // The futures are materialized up front; a closure returning a borrowing
    // async block does not satisfy the stream adapter's lifetime bound.
    let mut blob_futures = Vec::with_capacity(entries.len());
    for entry in entries {
        blob_futures.push(create_blob_entry(store, owner, name, domain, entry));
    }
    let results: Vec<Result<TreeEntry, BlobFailure>> = stream::iter(blob_futures)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut tree_entries = Vec::with_capacity(results.len() + 1);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(entry) => tree_entries.push(entry),
            Err(failure) => failures.push(failure),
        }
    }
    if !failures.is_empty() {
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        for failure in &failures {
            warn!(path = %failure.path, reason = %failure.reason, "Blob creation failed");
        }
        return Err(PublishError::Blobs { errors: failures });
    }

    if !has_cname {
        let blob_sha = store
            .put_blob(
                owner,
                name,
                domain.as_bytes().to_vec(),
                BlobEncoding::Base64,
            )
            .await?;
        tree_entries.push(TreeEntry {
            path: CNAME_FILE.to_string(),
            mode: BLOB_MODE,
            blob_sha,
        });
        debug!(domain, "Synthesized domain marker file");
    }

    // The blob pool finishes out of order; restore a deterministic tree.
    tree_entries.sort_by(|a, b| a.path.cmp(&b.path));
    let blob_count = tree_entries.len();

    let tree_sha = store
        .put_tree(owner, name, base_tree.clone(), tree_entries)
        .await?;
    let commit_sha = store
        .put_commit(owner, name, &tree_sha, parents.clone(), COMMIT_MESSAGE)
        .await?;

    if cancel.is_cancelled() {
        // The commit exists on the backend but the branch never observed it.
        return Err(PublishError::Cancelled);
    }

    match &prior {
        Some(head) => {
            store
                .update_ref(owner, name, branch, &head.sha, &commit_sha)
                .await?
        }
        None => store.create_ref(owner, name, branch, &commit_sha).await?,
    }

    info!(commit = %commit_sha, tree = %tree_sha, blobs = blob_count, "Published revision");
    Ok(BuiltRevision {
        commit_sha,
        tree_sha,
        parent_sha: parents.into_iter().next(),
        blob_count,
    })
}

/// Reads one file and stores it as a blob, forcing the domain marker's
/// content on the way through.
async fn create_blob_entry<R: RepoStore + ?Sized>(
    store: &R,
    owner: &str,
    name: &str,
    domain: &str,
    entry: &FileEntry,
) -> Result<TreeEntry, BlobFailure> {
    let mut content = tokio::fs::read(&entry.absolute_path)
        .await
        .map_err(|e| BlobFailure {
            path: entry.relative_path.clone(),
            reason: e.to_string(),
        })?;
    if entry.relative_path == CNAME_FILE {
        content = force_domain_marker(content, domain);
    }
    let blob_sha = store
        .put_blob(owner, name, content, BlobEncoding::Base64)
        .await
        .map_err(|e| BlobFailure {
            path: entry.relative_path.clone(),
            reason: e.to_string(),
        })?;
    Ok(TreeEntry {
        path: entry.relative_path.clone(),
        mode: BLOB_MODE,
        blob_sha,
    })
}

/// Forces the marker file's content to the target domain, preserving the
/// bytes only when they already match after trimming.
fn force_domain_marker(content: Vec<u8>, domain: &str) -> Vec<u8> {
    let current = String::from_utf8_lossy(&content);
    if current.trim() == domain.trim() {
        content
    } else {
        warn!(domain, "Overwriting domain marker file content");
        domain.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_preserved_when_already_correct() {
        let content = b"site.example.com\n".to_vec();
        let forced = force_domain_marker(content.clone(), "site.example.com");
        assert_eq!(forced, content);
    }

    #[test]
    fn marker_overwritten_when_different() {
        let forced = force_domain_marker(b"other.com".to_vec(), "site.example.com");
        assert_eq!(forced, b"site.example.com".to_vec());
    }
}
