//! Publisher variant for a version-controlled pages backend.
//!
//! Progression per run: client ready -> namespace checked -> storage created
//! -> uploaded -> domain enabled. Each step fills in state the later steps
//! need; calling a step out of order fails with a provider error rather
//! than panicking.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collect::collect;
use crate::config::{
    PublishTarget, DEFAULT_BLOB_CONCURRENCY, MAX_PAGES_FILE_SIZE_BYTES, PUBLISH_BRANCH,
    RECORD_TTL_SECONDS,
};
use crate::contract::{NamespaceStatus, RepoStore, SitePublisher, UploadReport};
use crate::dns::{DnsRecord, RecordType};
use crate::error::{ProviderError, PublishError};
use crate::revision::{publish_revision, BuiltRevision, RepoId};

const REPO_DESCRIPTION: &str = "Static site published with webhoist";

pub struct PagesPublisher<R: RepoStore> {
    store: R,
    target: PublishTarget,
    owner: Option<String>,
    last_revision: Option<BuiltRevision>,
    concurrency: usize,
}

impl<R: RepoStore> PagesPublisher<R> {
    pub fn new(store: R, target: PublishTarget) -> Self {
        Self {
            store,
            target,
            owner: None,
            last_revision: None,
            concurrency: DEFAULT_BLOB_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn last_revision(&self) -> Option<&BuiltRevision> {
        self.last_revision.as_ref()
    }

    fn owner(&self) -> Result<&str, ProviderError> {
        self.owner
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("client not instantiated".to_string()))
    }

    fn repo(&self) -> Result<RepoId, ProviderError> {
        Ok(RepoId {
            owner: self.owner()?.to_string(),
            // The repository is named after the full domain.
            name: self.target.domain().to_string(),
        })
    }
}

#[async_trait]
impl<R: RepoStore> SitePublisher for PagesPublisher<R> {
    async fn instantiate(&mut self) -> Result<(), ProviderError> {
        let owner = self.store.authenticated_owner().await?;
        info!(owner, "Resolved authenticated namespace owner");
        self.owner = Some(owner);
        Ok(())
    }

    async fn verify_namespace(&mut self) -> Result<NamespaceStatus, ProviderError> {
        let repo = self.repo()?;
        // Lookup errors propagate: an unknown answer must never be read as
        // "available" and clobber an existing site.
        let exists = self
            .store
            .repository_exists(&repo.owner, &repo.name)
            .await?;
        Ok(if exists {
            NamespaceStatus::Taken
        } else {
            NamespaceStatus::Available
        })
    }

    async fn create_storage(&mut self) -> Result<(), ProviderError> {
        self.owner()?;
        self.store
            .create_repository(self.target.domain(), REPO_DESCRIPTION)
            .await
    }

    async fn upload(&mut self, cancel: &CancellationToken) -> Result<UploadReport, PublishError> {
        let repo = self.repo()?;
        let entries = collect(self.target.folder(), MAX_PAGES_FILE_SIZE_BYTES)?;
        let revision = publish_revision(
            &self.store,
            &repo,
            self.target.domain(),
            PUBLISH_BRANCH,
            &entries,
            cancel,
            self.concurrency,
        )
        .await?;
        let report = UploadReport {
            files: revision.blob_count,
            revision: Some(revision.commit_sha.clone()),
        };
        self.last_revision = Some(revision);
        Ok(report)
    }

    async fn enable_domain(&mut self) -> Result<(), PublishError> {
        let repo = self.repo()?;
        self.store
            .enable_pages(&repo.owner, &repo.name, PUBLISH_BRANCH, "/")
            .await
            .map_err(|source| PublishError::Step {
                step: "enable_pages",
                source,
            })
    }

    fn required_dns_records(&self) -> Result<Vec<DnsRecord>, PublishError> {
        let owner = self.owner.as_deref().ok_or(PublishError::RecordsNotReady)?;
        // Exactly one alias record: the target name points at the backend's
        // canonical serving domain.
        Ok(vec![DnsRecord {
            name: format!("{}.", self.target.domain()),
            record_type: RecordType::Cname,
            ttl: RECORD_TTL_SECONDS,
            values: vec![self.store.serving_domain(owner)],
        }])
    }

    fn target_domain(&self) -> &str {
        self.target.domain()
    }
}
