//! Publisher variant for a private bucket fronted by a CDN.
//!
//! The backend has no versioned-commit model, so uploads are flat per-file
//! puts and republishing simply overwrites. Making the content publicly
//! addressable is a strictly ordered provisioning sequence with
//! cross-resource dependencies; a failed step aborts the sequence and the
//! reported error names the step. Earlier steps are not rolled back —
//! compensating cleanup is an operator responsibility.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collect::collect;
use crate::config::{PublishTarget, MAX_BUCKET_FILE_SIZE_BYTES, RECORD_TTL_SECONDS};
use crate::contract::{
    CdnProvider, CertificateAuthority, DistributionInfo, DistributionSpec, NamespaceStatus,
    ObjectStore, SitePublisher, UploadReport,
};
use crate::dns::{DnsRecord, RecordType};
use crate::error::{ProviderError, PublishError};

pub struct BucketCdnPublisher<S, C, A>
where
    S: ObjectStore,
    C: CdnProvider,
    A: CertificateAuthority,
{
    store: S,
    cdn: C,
    certificates: A,
    target: PublishTarget,
    account: Option<String>,
    distribution: Option<DistributionInfo>,
    certificate_arn: Option<String>,
    validation_records: Vec<DnsRecord>,
}

impl<S, C, A> BucketCdnPublisher<S, C, A>
where
    S: ObjectStore,
    C: CdnProvider,
    A: CertificateAuthority,
{
    pub fn new(store: S, cdn: C, certificates: A, target: PublishTarget) -> Self {
        Self {
            store,
            cdn,
            certificates,
            target,
            account: None,
            distribution: None,
            certificate_arn: None,
            validation_records: Vec::new(),
        }
    }

    pub fn certificate_arn(&self) -> Option<&str> {
        self.certificate_arn.as_deref()
    }

    fn account(&self) -> Result<&str, ProviderError> {
        self.account
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("client not instantiated".to_string()))
    }

    fn bucket_name(&self) -> Result<String, ProviderError> {
        Ok(format!(
            "{}-{}-webhoist",
            self.account()?,
            self.target.domain()
        ))
    }
}

/// Read access scoped to exactly one distribution, never "any CDN".
fn bucket_read_policy(bucket: &str, account: &str, distribution_id: &str) -> String {
    let objects_arn = format!("arn:aws:s3:::{bucket}/*");
    let distribution_arn = format!("arn:aws:cloudfront::{account}:distribution/{distribution_id}");
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "AllowCdnRead",
                "Effect": "Allow",
                "Principal": {"Service": "cloudfront.amazonaws.com"},
                "Action": ["s3:GetObject"],
                "Resource": [objects_arn],
                "Condition": {
                    "StringEquals": {"AWS:SourceArn": distribution_arn}
                }
            }
        ]
    })
    .to_string()
}

fn step(step: &'static str) -> impl FnOnce(ProviderError) -> PublishError {
    move |source| PublishError::Step { step, source }
}

#[async_trait]
impl<S, C, A> SitePublisher for BucketCdnPublisher<S, C, A>
where
    S: ObjectStore,
    C: CdnProvider,
    A: CertificateAuthority,
{
    async fn instantiate(&mut self) -> Result<(), ProviderError> {
        let account = self.store.account_id().await?;
        info!(account, "Resolved storage account");
        self.account = Some(account);
        Ok(())
    }

    async fn verify_namespace(&mut self) -> Result<NamespaceStatus, ProviderError> {
        // Bucket names embed the account id; a clash surfaces as a creation
        // conflict instead of a pre-flight probe.
        Ok(NamespaceStatus::Available)
    }

    async fn create_storage(&mut self) -> Result<(), ProviderError> {
        let bucket = self.bucket_name()?;
        self.store.create_bucket(&bucket).await?;
        // Lock the bucket down immediately; the CDN is granted scoped read
        // access later, never public ACLs.
        self.store.block_public_access(&bucket).await?;
        info!(bucket, "Created private bucket");
        Ok(())
    }

    async fn upload(&mut self, cancel: &CancellationToken) -> Result<UploadReport, PublishError> {
        let bucket = self.bucket_name()?;
        let entries = collect(self.target.folder(), MAX_BUCKET_FILE_SIZE_BYTES)?;
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        for entry in &entries {
            let body = tokio::fs::read(&entry.absolute_path)
                .await
                .map_err(|source| PublishError::Read {
                    path: entry.relative_path.clone(),
                    source,
                })?;
            self.store
                .put_object(&bucket, &entry.relative_path, body)
                .await?;
            debug!(key = %entry.relative_path, "Uploaded object");
        }
        info!(bucket, files = entries.len(), "Uploaded all objects");
        Ok(UploadReport {
            files: entries.len(),
            revision: None,
        })
    }

    async fn enable_domain(&mut self) -> Result<(), PublishError> {
        let account = self.account()?.to_string();
        let bucket = self.bucket_name()?;

        // (1) Access-control binding scoped to this bucket.
        let binding_id = self
            .cdn
            .create_access_binding(&format!("webhoist-oac-{bucket}"))
            .await
            .map_err(step("create_access_binding"))?;

        // (2) Distribution whose origin trusts that binding.
        let distribution = self
            .cdn
            .create_distribution(DistributionSpec {
                caller_reference: format!("webhoist-{bucket}"),
                comment: "webhoist distribution for bucket static site".to_string(),
                origin_domain: format!("{bucket}.s3.amazonaws.com"),
                access_binding_id: binding_id,
                default_root_object: "index.html".to_string(),
            })
            .await
            .map_err(step("create_distribution"))?;
        info!(
            distribution = %distribution.id,
            domain = %distribution.domain_name,
            "Created distribution"
        );
        self.distribution = Some(distribution.clone());

        // (3) Bucket policy permitting reads from that distribution only.
        let policy = bucket_read_policy(&bucket, &account, &distribution.id);
        self.store
            .put_bucket_policy(&bucket, &policy)
            .await
            .map_err(step("attach_bucket_policy"))?;

        // (4) Certificate for the custom domain, DNS-challenge validated.
        let certificate_arn = self
            .certificates
            .request_certificate(self.target.domain())
            .await
            .map_err(step("request_certificate"))?;
        self.certificate_arn = Some(certificate_arn.clone());

        // (5) The challenge's required records; every one must be upserted.
        self.validation_records = self
            .certificates
            .validation_records(&certificate_arn)
            .await
            .map_err(step("fetch_validation_records"))?;
        info!(
            validation_records = self.validation_records.len(),
            "Collected certificate validation records"
        );
        Ok(())
    }

    fn required_dns_records(&self) -> Result<Vec<DnsRecord>, PublishError> {
        let distribution = self
            .distribution
            .as_ref()
            .ok_or(PublishError::RecordsNotReady)?;
        let mut records = vec![DnsRecord {
            name: format!("{}.", self.target.domain()),
            record_type: RecordType::Cname,
            ttl: RECORD_TTL_SECONDS,
            values: vec![distribution.domain_name.clone()],
        }];
        records.extend(self.validation_records.iter().cloned());
        Ok(records)
    }

    fn target_domain(&self) -> &str {
        self.target.domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_binds_the_exact_distribution() {
        let policy = bucket_read_policy("my-bucket", "123456789012", "DIST123");
        assert!(policy.contains("arn:aws:s3:::my-bucket/*"));
        assert!(policy.contains("arn:aws:cloudfront::123456789012:distribution/DIST123"));
        assert!(policy.contains("cloudfront.amazonaws.com"));
    }
}
