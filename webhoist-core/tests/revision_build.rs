use std::fs;

use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use webhoist_core::collect::{collect, FileEntry};
use webhoist_core::contract::{CommitInfo, MockRepoStore, RefInfo};
use webhoist_core::error::{ProviderError, PublishError};
use webhoist_core::revision::{publish_revision, RepoId, CNAME_FILE, COMMIT_MESSAGE};

const DOMAIN: &str = "site.example.com";

fn repo() -> RepoId {
    RepoId {
        owner: "octocat".to_string(),
        name: DOMAIN.to_string(),
    }
}

/// Derives blob ids from content so tree assertions can see what was stored.
fn content_sha(content: &[u8]) -> String {
    format!("sha({})", String::from_utf8_lossy(content))
}

#[tokio::test]
async fn first_publish_creates_the_branch_and_synthesizes_the_marker() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join("index.html"), "<html></html>").unwrap();
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store
        .expect_get_ref()
        .withf(|owner: &str, name: &str, branch: &str| {
            owner == "octocat" && name == DOMAIN && branch == "main"
        })
        .return_once(|_, _, _| Ok(None));
    store
        .expect_put_blob()
        .times(2)
        .returning(|_, _, content, _| Ok(content_sha(&content)));
    store
        .expect_put_tree()
        .withf(|_, _, base_tree, entries| {
            // No prior head: the tree is not layered over anything.
            base_tree.is_none()
                && entries.len() == 2
                && entries[0].path == CNAME_FILE
                && entries[0].blob_sha == content_sha(DOMAIN.as_bytes())
                && entries[1].path == "index.html"
        })
        .return_once(|_, _, _, _| Ok("tree-1".to_string()));
    store
        .expect_put_commit()
        .withf(|_, _, tree_sha: &str, parents, message: &str| {
            tree_sha == "tree-1" && parents.is_empty() && message == COMMIT_MESSAGE
        })
        .return_once(|_, _, _, _, _| Ok("commit-1".to_string()));
    store
        .expect_create_ref()
        .withf(|_, _, branch: &str, sha: &str| branch == "main" && sha == "commit-1")
        .return_once(|_, _, _, _| Ok(()));
    store.expect_update_ref().times(0);

    let cancel = CancellationToken::new();
    let revision = publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect("first publish should succeed");

    assert_eq!(revision.commit_sha, "commit-1");
    assert_eq!(revision.tree_sha, "tree-1");
    assert_eq!(revision.parent_sha, None);
    assert_eq!(revision.blob_count, 2, "marker file should be counted");
}

#[tokio::test]
async fn republish_layers_over_the_prior_head_and_fast_forwards() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join("index.html"), "v2").unwrap();
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| {
        Ok(Some(RefInfo {
            sha: "commit-1".to_string(),
        }))
    });
    store
        .expect_get_commit()
        .withf(|_, _, sha: &str| sha == "commit-1")
        .return_once(|_, _, _| {
            Ok(CommitInfo {
                sha: "commit-1".to_string(),
                tree_sha: "tree-1".to_string(),
            })
        });
    store
        .expect_put_blob()
        .times(2)
        .returning(|_, _, content, _| Ok(content_sha(&content)));
    store
        .expect_put_tree()
        .withf(|_, _, base_tree, _| base_tree.as_deref() == Some("tree-1"))
        .return_once(|_, _, _, _| Ok("tree-2".to_string()));
    store
        .expect_put_commit()
        .withf(|_, _, _, parents, _| parents.len() == 1 && parents[0] == "commit-1")
        .return_once(|_, _, _, _, _| Ok("commit-2".to_string()));
    store
        .expect_update_ref()
        .withf(|_, _, _, expected_prior: &str, sha: &str| {
            expected_prior == "commit-1" && sha == "commit-2"
        })
        .return_once(|_, _, _, _, _| Ok(()));
    store.expect_create_ref().times(0);

    let cancel = CancellationToken::new();
    let revision = publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect("republish should succeed");

    assert_eq!(revision.parent_sha.as_deref(), Some("commit-1"));
    assert_eq!(revision.commit_sha, "commit-2");
}

#[tokio::test]
async fn bounded_pool_publish_runs_on_a_spawned_task() {
    let folder = tempdir().unwrap();
    for i in 0..12 {
        fs::write(
            folder.path().join(format!("page-{i:02}.html")),
            format!("page {i}"),
        )
        .unwrap();
    }
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| Ok(None));
    store
        .expect_put_blob()
        .times(13)
        .returning(|_, _, content, _| Ok(content_sha(&content)));
    store
        .expect_put_tree()
        .withf(|_, _, _, entries| entries.len() == 13)
        .return_once(|_, _, _, _| Ok("tree-1".to_string()));
    store
        .expect_put_commit()
        .return_once(|_, _, _, _, _| Ok("commit-1".to_string()));
    store.expect_create_ref().return_once(|_, _, _, _| Ok(()));

    // Spawning forces the publish future to be Send, the same bound the
    // publisher traits place on it.
    let cancel = CancellationToken::new();
    let revision = tokio::spawn(async move {
        publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 2).await
    })
    .await
    .expect("task should not panic")
    .expect("publish should succeed");

    assert_eq!(revision.blob_count, 13, "twelve pages plus the marker file");
}

#[tokio::test]
async fn marker_file_content_is_forced_to_the_domain() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join(CNAME_FILE), "wrong.example.org").unwrap();
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| Ok(None));
    store
        .expect_put_blob()
        .withf(|_, _, content, _| content == DOMAIN.as_bytes())
        .return_once(|_, _, content, _| Ok(content_sha(&content)));
    store
        .expect_put_tree()
        .withf(|_, _, _, entries| entries.len() == 1 && entries[0].path == CNAME_FILE)
        .return_once(|_, _, _, _| Ok("tree-1".to_string()));
    store
        .expect_put_commit()
        .return_once(|_, _, _, _, _| Ok("commit-1".to_string()));
    store.expect_create_ref().return_once(|_, _, _, _| Ok(()));

    let cancel = CancellationToken::new();
    publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect("publish should succeed");
}

#[tokio::test]
async fn all_blob_failures_are_collected_and_nothing_is_committed() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join("ok.html"), "fine").unwrap();
    let mut entries = collect(folder.path(), 0).unwrap();
    // Two entries whose backing files vanished between collect and upload.
    entries.push(FileEntry {
        relative_path: "gone-b.html".to_string(),
        absolute_path: folder.path().join("gone-b.html"),
        size_bytes: 1,
    });
    entries.push(FileEntry {
        relative_path: "gone-a.html".to_string(),
        absolute_path: folder.path().join("gone-a.html"),
        size_bytes: 1,
    });

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| Ok(None));
    store
        .expect_put_blob()
        .returning(|_, _, content, _| Ok(content_sha(&content)));
    store.expect_put_tree().times(0);
    store.expect_put_commit().times(0);
    store.expect_create_ref().times(0);

    let cancel = CancellationToken::new();
    let err = publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect_err("publish should fail");

    match err {
        PublishError::Blobs { errors } => {
            let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
            assert_eq!(paths, vec!["gone-a.html", "gone-b.html"], "failures sorted by path");
        }
        other => panic!("expected Blobs error, got {other}"),
    }
}

#[tokio::test]
async fn backend_blob_rejection_is_reported_per_file() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join("ok.html"), "fine").unwrap();
    fs::write(folder.path().join("rejected.html"), "nope").unwrap();
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| Ok(None));
    store.expect_put_blob().returning(|_, _, content, _| {
        if content == b"nope" {
            Err(ProviderError::backend("storage quota exceeded"))
        } else {
            Ok(content_sha(&content))
        }
    });
    store.expect_put_tree().times(0);

    let cancel = CancellationToken::new();
    let err = publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect_err("publish should fail");

    match err {
        PublishError::Blobs { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].path, "rejected.html");
            assert!(errors[0].reason.contains("storage quota exceeded"));
        }
        other => panic!("expected Blobs error, got {other}"),
    }
}

#[tokio::test]
async fn cancellation_before_upload_moves_nothing() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join("index.html"), "<html></html>").unwrap();
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| Ok(None));
    store.expect_put_blob().times(0);
    store.expect_create_ref().times(0);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect_err("cancelled publish should fail");

    assert!(matches!(err, PublishError::Cancelled));
}

#[tokio::test]
async fn stale_head_surfaces_as_concurrent_modification() {
    let folder = tempdir().unwrap();
    fs::write(folder.path().join("index.html"), "v2").unwrap();
    let entries = collect(folder.path(), 0).unwrap();

    let mut store = MockRepoStore::new();
    store.expect_get_ref().return_once(|_, _, _| {
        Ok(Some(RefInfo {
            sha: "commit-1".to_string(),
        }))
    });
    store.expect_get_commit().return_once(|_, _, _| {
        Ok(CommitInfo {
            sha: "commit-1".to_string(),
            tree_sha: "tree-1".to_string(),
        })
    });
    store
        .expect_put_blob()
        .returning(|_, _, content, _| Ok(content_sha(&content)));
    store
        .expect_put_tree()
        .return_once(|_, _, _, _| Ok("tree-2".to_string()));
    store
        .expect_put_commit()
        .return_once(|_, _, _, _, _| Ok("commit-2".to_string()));
    store.expect_update_ref().return_once(|_, _, _, _, _| {
        Err(ProviderError::ConcurrentModification(
            "branch moved".to_string(),
        ))
    });

    let cancel = CancellationToken::new();
    let err = publish_revision(&store, &repo(), DOMAIN, "main", &entries, &cancel, 4)
        .await
        .expect_err("stale publish should fail");

    assert!(matches!(
        err,
        PublishError::Provider(ProviderError::ConcurrentModification(_))
    ));
}
