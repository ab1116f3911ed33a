//! # contract: capability interfaces between the pipeline and its providers
//!
//! This module defines the traits the deployment pipeline is written
//! against, plus the plain data types that cross those boundaries. Concrete
//! transports (a source-control REST API, cloud SDK clients) live outside
//! the core crate and implement these traits; tests use the generated mocks.
//!
//! ## Interface & Extensibility
//! - Implement [`RepoStore`] for a version-controlled hosting backend with
//!   content-addressed blobs, trees, commits and mutable refs.
//! - Implement [`ObjectStore`], [`CdnProvider`] and [`CertificateAuthority`]
//!   for a bucket + CDN hosting pair.
//! - Implement [`ZoneStore`] for a DNS backend with atomic change batches.
//! - [`SitePublisher`] and [`DnsReconciler`] are the two seams the
//!   orchestrator drives; add new providers by implementing the same
//!   contract, not by extending a shared base.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests. The mocks are exported
//!   behind the `test-export-mocks` feature.

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::dns::{DnsRecord, HostedZone};
use crate::error::{DnsError, ProviderError, PublishError};

/// File mode recorded for every published blob.
pub const BLOB_MODE: &str = "100644";

/// How blob bytes are transported to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobEncoding {
    Base64,
    Utf8,
}

/// One path -> blob mapping inside a revision's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    pub blob_sha: String,
}

/// Observed state of a branch ref: the commit it currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefInfo {
    pub sha: String,
}

/// A commit as resolved from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub tree_sha: String,
}

/// Everything the CDN needs to create a distribution in front of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    /// Idempotency key for the create call.
    pub caller_reference: String,
    pub comment: String,
    /// Origin hostname of the backing bucket.
    pub origin_domain: String,
    /// Access-control binding the origin must trust.
    pub access_binding_id: String,
    pub default_root_object: String,
}

/// The provisioned distribution, as needed for DNS and the bucket policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionInfo {
    pub id: String,
    pub domain_name: String,
}

/// Outcome of the namespace availability probe. A backend lookup failure is
/// deliberately NOT mapped to `Available`: the probe fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceStatus {
    Available,
    Taken,
}

/// What a completed upload looked like, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub files: usize,
    /// Revision identifier for commit-based backends; absent for flat ones.
    pub revision: Option<String>,
}

/// Version-controlled hosting backend: content-addressed blob/tree/commit
/// storage plus mutable branch refs. The only mutable entity is the ref;
/// everything else is immutable once created.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepoStore: Send + Sync {
    /// Resolve the namespace owner the credentials authenticate as.
    async fn authenticated_owner(&self) -> Result<String, ProviderError>;

    /// Whether a repository with this name already exists. An `Err` means
    /// the answer is unknown; callers must not treat it as "available".
    async fn repository_exists(&self, owner: &str, name: &str) -> Result<bool, ProviderError>;

    async fn create_repository(&self, name: &str, description: &str)
        -> Result<(), ProviderError>;

    /// Store raw bytes as a content-addressed blob, returning its id.
    async fn put_blob(
        &self,
        owner: &str,
        repo: &str,
        content: Vec<u8>,
        encoding: BlobEncoding,
    ) -> Result<String, ProviderError>;

    /// Current head of `branch`, or `None` when the branch does not exist.
    async fn get_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<RefInfo>, ProviderError>;

    async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitInfo, ProviderError>;

    /// Create a tree, layered over `base_tree` when present.
    async fn put_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: Option<String>,
        entries: Vec<TreeEntry>,
    ) -> Result<String, ProviderError>;

    async fn put_commit(
        &self,
        owner: &str,
        repo: &str,
        tree_sha: &str,
        parents: Vec<String>,
        message: &str,
    ) -> Result<String, ProviderError>;

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), ProviderError>;

    /// Fast-forward the branch ref, guarded by a compare-and-swap on the
    /// previously observed head. A stale observation fails with
    /// [`ProviderError::ConcurrentModification`].
    async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        expected_prior: &str,
        sha: &str,
    ) -> Result<(), ProviderError>;

    /// Enable public serving from the published branch and root path.
    async fn enable_pages(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<(), ProviderError>;

    /// Canonical serving hostname for an owner's published sites.
    fn serving_domain(&self, owner: &str) -> String;
}

/// Flat bucket/object storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Account identifier the credentials resolve to; used in resource names.
    async fn account_id(&self) -> Result<String, ProviderError>;

    async fn create_bucket(&self, name: &str) -> Result<(), ProviderError>;

    /// Deny-by-default: no public ACLs or policies on the bucket itself.
    async fn block_public_access(&self, bucket: &str) -> Result<(), ProviderError>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>)
        -> Result<(), ProviderError>;

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), ProviderError>;
}

/// CDN in front of a bucket origin.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CdnProvider: Send + Sync {
    /// Create the access-control binding the distribution origin will use,
    /// returning its id.
    async fn create_access_binding(&self, name: &str) -> Result<String, ProviderError>;

    async fn create_distribution(
        &self,
        spec: DistributionSpec,
    ) -> Result<DistributionInfo, ProviderError>;
}

/// TLS certificate issuance with DNS-challenge validation.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Request a certificate for `domain`, returning its identifier.
    async fn request_certificate(&self, domain: &str) -> Result<String, ProviderError>;

    /// The DNS records the challenge requires. All of them must be applied
    /// or the certificate will never validate.
    async fn validation_records(
        &self,
        certificate_arn: &str,
    ) -> Result<Vec<DnsRecord>, ProviderError>;
}

/// DNS backend with atomic record change batches.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ZoneStore: Send + Sync {
    async fn list_zones_by_name(&self, name: &str) -> Result<Vec<HostedZone>, ProviderError>;

    /// Apply all records as idempotent upserts in one atomic batch: either
    /// all of them land or none do.
    async fn apply_upserts(
        &self,
        zone_id: &str,
        records: &[DnsRecord],
    ) -> Result<(), ProviderError>;
}

/// A hosting target the orchestrator can drive through the fixed pipeline:
/// provision storage, upload content, make it publicly addressable, and
/// report the DNS records a custom domain needs.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SitePublisher: Send + Sync {
    /// Resolve client identity (owner, account). Must run first.
    async fn instantiate(&mut self) -> Result<(), ProviderError>;

    /// Probe whether the target namespace is free. Fails closed: an unknown
    /// answer is an error, never `Available`.
    async fn verify_namespace(&mut self) -> Result<NamespaceStatus, ProviderError>;

    async fn create_storage(&mut self) -> Result<(), ProviderError>;

    /// Collect and upload the content folder. Checks `cancel` before any
    /// new batch of concurrent work; a cancelled upload leaves no ref
    /// update behind.
    async fn upload(&mut self, cancel: &CancellationToken) -> Result<UploadReport, PublishError>;

    /// Make the uploaded content publicly addressable (serving config, CDN,
    /// certificate). Failures name the provisioning step.
    async fn enable_domain(&mut self) -> Result<(), PublishError>;

    /// The records the DNS reconciler must upsert. Non-empty once
    /// provisioning has completed.
    fn required_dns_records(&self) -> Result<Vec<DnsRecord>, PublishError>;

    fn target_domain(&self) -> &str;
}

/// Reconciles a DNS zone so the custom domain points at the hosting target.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DnsReconciler: Send + Sync {
    /// Whether a hosted zone exactly matching the base domain exists.
    /// A plain miss is `Ok(false)`, not an error.
    async fn verify_zone_exists(&self, base_domain: &str) -> Result<bool, DnsError>;

    /// Upsert all records into the matching zone as one atomic batch.
    async fn upsert_records(&self, base_domain: &str, records: &[DnsRecord])
        -> Result<(), DnsError>;
}
