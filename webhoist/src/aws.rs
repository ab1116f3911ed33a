//! AWS adapters: object storage on S3, CDN on CloudFront, certificates on
//! ACM and zones on Route 53, each implementing one core contract trait.
//!
//! Credentials and region come from the default provider chain. ACM gets a
//! dedicated us-east-1 client because CloudFront only accepts certificates
//! from that region.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::{debug, info};

use webhoist_core::contract::{
    CdnProvider, CertificateAuthority, DistributionInfo, DistributionSpec, ObjectStore, ZoneStore,
};
use webhoist_core::dns::{DnsRecord, HostedZone, RecordType};
use webhoist_core::error::ProviderError;

/// Loads the shared SDK configuration from the default provider chain.
pub async fn default_config() -> SdkConfig {
    aws_config::load_defaults(BehaviorVersion::latest()).await
}

fn rr_type(record_type: RecordType) -> aws_sdk_route53::types::RrType {
    match record_type {
        RecordType::Cname => aws_sdk_route53::types::RrType::Cname,
        RecordType::A => aws_sdk_route53::types::RrType::A,
        RecordType::Txt => aws_sdk_route53::types::RrType::Txt,
    }
}

pub struct S3ObjectStore {
    s3: aws_sdk_s3::Client,
    sts: aws_sdk_sts::Client,
    region: Option<String>,
}

impl S3ObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
            region: config.region().map(|r| r.to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn account_id(&self) -> Result<String, ProviderError> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(ProviderError::backend)?;
        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Auth("caller identity has no account id".to_string()))
    }

    async fn create_bucket(&self, name: &str) -> Result<(), ProviderError> {
        let mut request = self.s3.create_bucket().bucket(name);
        // us-east-1 is the default location and rejects an explicit
        // constraint naming it.
        if let Some(region) = self.region.as_deref().filter(|r| *r != "us-east-1") {
            request = request.create_bucket_configuration(
                aws_sdk_s3::types::CreateBucketConfiguration::builder()
                    .location_constraint(aws_sdk_s3::types::BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request.send().await.map_err(ProviderError::backend)?;
        info!(bucket = name, "Created bucket");
        Ok(())
    }

    async fn block_public_access(&self, bucket: &str) -> Result<(), ProviderError> {
        let config = aws_sdk_s3::types::PublicAccessBlockConfiguration::builder()
            .block_public_acls(true)
            .ignore_public_acls(true)
            .block_public_policy(true)
            .restrict_public_buckets(true)
            .build();
        self.s3
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(config)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), ProviderError> {
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(ProviderError::backend)?;
        debug!(bucket, key, "Stored object");
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), ProviderError> {
        self.s3
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        Ok(())
    }
}

pub struct CloudFrontCdn {
    cloudfront: aws_sdk_cloudfront::Client,
}

impl CloudFrontCdn {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            cloudfront: aws_sdk_cloudfront::Client::new(config),
        }
    }
}

#[async_trait]
impl CdnProvider for CloudFrontCdn {
    async fn create_access_binding(&self, name: &str) -> Result<String, ProviderError> {
        let config = aws_sdk_cloudfront::types::OriginAccessControlConfig::builder()
            .name(name)
            .origin_access_control_origin_type(
                aws_sdk_cloudfront::types::OriginAccessControlOriginTypes::S3,
            )
            .signing_behavior(aws_sdk_cloudfront::types::OriginAccessControlSigningBehaviors::Always)
            .signing_protocol(aws_sdk_cloudfront::types::OriginAccessControlSigningProtocols::Sigv4)
            .build()
            .map_err(ProviderError::backend)?;
        let output = self
            .cloudfront
            .create_origin_access_control()
            .origin_access_control_config(config)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let binding = output.origin_access_control().ok_or_else(|| {
            ProviderError::backend("origin access control missing from create response")
        })?;
        Ok(binding.id().to_string())
    }

    async fn create_distribution(
        &self,
        spec: DistributionSpec,
    ) -> Result<DistributionInfo, ProviderError> {
        use aws_sdk_cloudfront::types::{
            AllowedMethods, CachedMethods, CookiePreference, DefaultCacheBehavior,
            DistributionConfig, ForwardedValues, ItemSelection, Method, Origin, Origins,
            S3OriginConfig, ViewerCertificate, ViewerProtocolPolicy,
        };

        const ORIGIN_ID: &str = "bucket-origin";

        let s3_origin = S3OriginConfig::builder()
            .origin_access_identity("")
            .build()
            .map_err(ProviderError::backend)?;
        let origin = Origin::builder()
            .id(ORIGIN_ID)
            .domain_name(&spec.origin_domain)
            .origin_access_control_id(&spec.access_binding_id)
            .s3_origin_config(s3_origin)
            .build()
            .map_err(ProviderError::backend)?;
        let origins = Origins::builder()
            .quantity(1)
            .items(origin)
            .build()
            .map_err(ProviderError::backend)?;

        let cookies = CookiePreference::builder()
            .forward(ItemSelection::None)
            .build()
            .map_err(ProviderError::backend)?;
        let forwarded = ForwardedValues::builder()
            .query_string(false)
            .cookies(cookies)
            .build()
            .map_err(ProviderError::backend)?;
        let cached_methods = CachedMethods::builder()
            .quantity(2)
            .items(Method::Get)
            .items(Method::Head)
            .build()
            .map_err(ProviderError::backend)?;
        let allowed_methods = AllowedMethods::builder()
            .quantity(2)
            .items(Method::Get)
            .items(Method::Head)
            .cached_methods(cached_methods)
            .build()
            .map_err(ProviderError::backend)?;
        let cache_behavior = DefaultCacheBehavior::builder()
            .target_origin_id(ORIGIN_ID)
            .viewer_protocol_policy(ViewerProtocolPolicy::RedirectToHttps)
            .allowed_methods(allowed_methods)
            .forwarded_values(forwarded)
            .min_ttl(0)
            .build()
            .map_err(ProviderError::backend)?;

        // The custom-domain certificate is issued after this call, so the
        // distribution starts on the default certificate.
        let certificate = ViewerCertificate::builder()
            .cloud_front_default_certificate(true)
            .build();

        let config = DistributionConfig::builder()
            .caller_reference(&spec.caller_reference)
            .comment(&spec.comment)
            .default_root_object(&spec.default_root_object)
            .origins(origins)
            .default_cache_behavior(cache_behavior)
            .viewer_certificate(certificate)
            .enabled(true)
            .build()
            .map_err(ProviderError::backend)?;

        let output = self
            .cloudfront
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let distribution = output
            .distribution()
            .ok_or_else(|| ProviderError::backend("distribution missing from create response"))?;
        info!(
            distribution = distribution.id(),
            domain = distribution.domain_name(),
            "Created distribution"
        );
        Ok(DistributionInfo {
            id: distribution.id().to_string(),
            domain_name: distribution.domain_name().to_string(),
        })
    }
}

pub struct AcmCertificates {
    acm: aws_sdk_acm::Client,
}

impl AcmCertificates {
    /// Builds a client pinned to us-east-1, the only region CloudFront
    /// accepts certificates from.
    pub async fn new_us_east_1() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .load()
            .await;
        Self {
            acm: aws_sdk_acm::Client::new(&config),
        }
    }
}

#[async_trait]
impl CertificateAuthority for AcmCertificates {
    async fn request_certificate(&self, domain: &str) -> Result<String, ProviderError> {
        let output = self
            .acm
            .request_certificate()
            .domain_name(domain)
            .validation_method(aws_sdk_acm::types::ValidationMethod::Dns)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        output
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::backend("certificate request returned no arn"))
    }

    async fn validation_records(
        &self,
        certificate_arn: &str,
    ) -> Result<Vec<DnsRecord>, ProviderError> {
        let output = self
            .acm
            .describe_certificate()
            .certificate_arn(certificate_arn)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        let certificate = output
            .certificate()
            .ok_or_else(|| ProviderError::NotFound(format!("certificate {certificate_arn}")))?;
        let mut records = Vec::new();
        for option in certificate.domain_validation_options() {
            // The validation record lags the request by a few seconds; an
            // absent record here means the caller has to retry.
            let resource = option.resource_record().ok_or_else(|| {
                ProviderError::backend("validation record not yet attached to certificate")
            })?;
            records.push(DnsRecord {
                name: resource.name().to_string(),
                record_type: RecordType::Cname,
                ttl: webhoist_core::config::RECORD_TTL_SECONDS,
                values: vec![resource.value().to_string()],
            });
        }
        Ok(records)
    }
}

pub struct Route53Zones {
    route53: aws_sdk_route53::Client,
}

impl Route53Zones {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            route53: aws_sdk_route53::Client::new(config),
        }
    }
}

#[async_trait]
impl ZoneStore for Route53Zones {
    async fn list_zones_by_name(&self, name: &str) -> Result<Vec<HostedZone>, ProviderError> {
        let output = self
            .route53
            .list_hosted_zones_by_name()
            .dns_name(name)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        Ok(output
            .hosted_zones()
            .iter()
            .map(|zone| HostedZone {
                id: zone.id().to_string(),
                name: zone.name().to_string(),
            })
            .collect())
    }

    async fn apply_upserts(
        &self,
        zone_id: &str,
        records: &[DnsRecord],
    ) -> Result<(), ProviderError> {
        use aws_sdk_route53::types::{
            Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet,
        };

        let mut changes = Vec::with_capacity(records.len());
        for record in records {
            let mut set = ResourceRecordSet::builder()
                .name(&record.name)
                .r#type(rr_type(record.record_type))
                .ttl(record.ttl);
            for value in &record.values {
                set = set.resource_records(
                    ResourceRecord::builder()
                        .value(value)
                        .build()
                        .map_err(ProviderError::backend)?,
                );
            }
            changes.push(
                Change::builder()
                    .action(ChangeAction::Upsert)
                    .resource_record_set(set.build().map_err(ProviderError::backend)?)
                    .build()
                    .map_err(ProviderError::backend)?,
            );
        }
        let batch = ChangeBatch::builder()
            .set_changes(Some(changes))
            .build()
            .map_err(ProviderError::backend)?;
        self.route53
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(ProviderError::backend)?;
        Ok(())
    }
}
