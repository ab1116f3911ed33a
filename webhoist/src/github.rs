//! GitHub adapter: implements the core [`RepoStore`] contract against the
//! GitHub REST v3 API (git data, repositories, pages).
//!
//! All transport, serialization and status mapping is encapsulated here;
//! the core crate only ever sees [`ProviderError`] values. Authentication
//! uses a personal access token from `GITHUB_TOKEN`.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use webhoist_core::contract::{BlobEncoding, CommitInfo, RefInfo, RepoStore, TreeEntry};
use webhoist_core::error::ProviderError;

const API_BASE: &str = "https://api.github.com";
const ACCEPT_HEADER: &str = "application/vnd.github+json";

pub struct GithubRepoStore {
    http: reqwest::Client,
    token: String,
}

impl GithubRepoStore {
    /// Builds a client from `GITHUB_TOKEN` in the environment.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| ProviderError::Auth("GITHUB_TOKEN not set".to_string()))?;
        if token.is_empty() {
            return Err(ProviderError::Auth("GITHUB_TOKEN is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .user_agent("webhoist")
            .build()
            .map_err(ProviderError::backend)?;
        Ok(Self { http, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{API_BASE}{path}")
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.decorate(self.http.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.decorate(self.http.post(self.url(path)))
    }

    fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.decorate(self.http.patch(self.url(path)))
    }

    fn decorate(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
    }
}

/// Maps a non-success response onto the provider error taxonomy.
async fn check(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => ProviderError::Auth(format!("{context}: {status}: {body}")),
        404 => ProviderError::NotFound(format!("{context}: {body}")),
        409 | 422 => ProviderError::Conflict(format!("{context}: {status}: {body}")),
        _ => ProviderError::backend(format!("{context}: {status}: {body}")),
    })
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Serialize)]
struct BlobRequest<'a> {
    content: String,
    encoding: &'a str,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: GitObject,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ShaResponse,
}

#[derive(Serialize)]
struct TreeEntryRequest<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct TreeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<&'a str>,
    tree: Vec<TreeEntryRequest<'a>>,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

#[derive(Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Serialize)]
struct PagesSource<'a> {
    branch: &'a str,
    path: &'a str,
}

#[derive(Serialize)]
struct PagesRequest<'a> {
    source: PagesSource<'a>,
}

#[async_trait]
impl RepoStore for GithubRepoStore {
    async fn authenticated_owner(&self) -> Result<String, ProviderError> {
        let response = self
            .get("/user")
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let user: UserResponse = check(response, "resolving authenticated user")
            .await?
            .json()
            .await
            .map_err(ProviderError::backend)?;
        if user.login.is_empty() {
            return Err(ProviderError::Auth(
                "authenticated user has no login".to_string(),
            ));
        }
        Ok(user.login)
    }

    async fn repository_exists(&self, owner: &str, name: &str) -> Result<bool, ProviderError> {
        let response = self
            .get(&format!("/repos/{owner}/{name}"))
            .send()
            .await
            .map_err(ProviderError::backend)?;
        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        check(response, "checking repository").await?;
        Ok(true)
    }

    async fn create_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let body = CreateRepoRequest {
            name,
            description,
            private: false,
            auto_init: true,
        };
        let response = self
            .post("/user/repos")
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        check(response, "creating repository").await?;
        info!(repository = name, "Created repository");
        Ok(())
    }

    async fn put_blob(
        &self,
        owner: &str,
        repo: &str,
        content: Vec<u8>,
        encoding: BlobEncoding,
    ) -> Result<String, ProviderError> {
        let body = match encoding {
            BlobEncoding::Base64 => BlobRequest {
                content: base64::engine::general_purpose::STANDARD.encode(&content),
                encoding: "base64",
            },
            BlobEncoding::Utf8 => BlobRequest {
                content: String::from_utf8_lossy(&content).into_owned(),
                encoding: "utf-8",
            },
        };
        let response = self
            .post(&format!("/repos/{owner}/{repo}/git/blobs"))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let blob: ShaResponse = check(response, "creating blob")
            .await?
            .json()
            .await
            .map_err(ProviderError::backend)?;
        debug!(sha = %blob.sha, "Created blob");
        Ok(blob.sha)
    }

    async fn get_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<RefInfo>, ProviderError> {
        let response = self
            .get(&format!("/repos/{owner}/{repo}/git/ref/heads/{branch}"))
            .send()
            .await
            .map_err(ProviderError::backend)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let reference: RefResponse = check(response, "resolving branch ref")
            .await?
            .json()
            .await
            .map_err(ProviderError::backend)?;
        Ok(Some(RefInfo {
            sha: reference.object.sha,
        }))
    }

    async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitInfo, ProviderError> {
        let response = self
            .get(&format!("/repos/{owner}/{repo}/git/commits/{sha}"))
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let commit: CommitResponse = check(response, "resolving commit")
            .await?
            .json()
            .await
            .map_err(ProviderError::backend)?;
        Ok(CommitInfo {
            sha: commit.sha,
            tree_sha: commit.tree.sha,
        })
    }

    async fn put_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: Option<String>,
        entries: Vec<TreeEntry>,
    ) -> Result<String, ProviderError> {
        let body = TreeRequest {
            base_tree: base_tree.as_deref(),
            tree: entries
                .iter()
                .map(|entry| TreeEntryRequest {
                    path: &entry.path,
                    mode: entry.mode,
                    kind: "blob",
                    sha: &entry.blob_sha,
                })
                .collect(),
        };
        let response = self
            .post(&format!("/repos/{owner}/{repo}/git/trees"))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let tree: ShaResponse = check(response, "creating tree")
            .await?
            .json()
            .await
            .map_err(ProviderError::backend)?;
        Ok(tree.sha)
    }

    async fn put_commit(
        &self,
        owner: &str,
        repo: &str,
        tree_sha: &str,
        parents: Vec<String>,
        message: &str,
    ) -> Result<String, ProviderError> {
        let body = CommitRequest {
            message,
            tree: tree_sha,
            parents: &parents,
        };
        let response = self
            .post(&format!("/repos/{owner}/{repo}/git/commits"))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let commit: ShaResponse = check(response, "creating commit")
            .await?
            .json()
            .await
            .map_err(ProviderError::backend)?;
        Ok(commit.sha)
    }

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), ProviderError> {
        let body = CreateRefRequest {
            reference: format!("refs/heads/{branch}"),
            sha,
        };
        let response = self
            .post(&format!("/repos/{owner}/{repo}/git/refs"))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        check(response, "creating branch ref").await?;
        Ok(())
    }

    async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        expected_prior: &str,
        sha: &str,
    ) -> Result<(), ProviderError> {
        // Optimistic concurrency: re-read the head and compare before the
        // non-forced update; the backend's fast-forward guard backs the
        // remaining window.
        let current = self.get_ref(owner, repo, branch).await?;
        match current {
            Some(head) if head.sha == expected_prior => {}
            Some(head) => {
                return Err(ProviderError::ConcurrentModification(format!(
                    "branch `{branch}` moved from {expected_prior} to {}",
                    head.sha
                )))
            }
            None => {
                return Err(ProviderError::ConcurrentModification(format!(
                    "branch `{branch}` disappeared during publish"
                )))
            }
        }
        let body = UpdateRefRequest { sha, force: false };
        let response = self
            .patch(&format!("/repos/{owner}/{repo}/git/refs/heads/{branch}"))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let status = response.status().as_u16();
        if status == 409 || status == 422 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ConcurrentModification(format!(
                "ref update rejected as non-fast-forward: {body}"
            )));
        }
        check(response, "updating branch ref").await?;
        Ok(())
    }

    async fn enable_pages(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<(), ProviderError> {
        let body = PagesRequest {
            source: PagesSource { branch, path },
        };
        let response = self
            .post(&format!("/repos/{owner}/{repo}/pages"))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        check(response, "enabling pages").await?;
        info!(repository = repo, "Enabled public serving");
        Ok(())
    }

    fn serving_domain(&self, owner: &str) -> String {
        format!("{owner}.github.io")
    }
}
