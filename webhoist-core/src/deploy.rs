//! High-level pipeline: orchestrates provisioning, upload and DNS for one
//! deployment run.
//!
//! The pipeline is fixed, with no branching beyond the caller's choice of
//! [`SitePublisher`] and [`DnsReconciler`] implementations:
//!
//!   instantiate client -> verify namespace free -> create storage ->
//!   upload -> enable public serving -> collect required records ->
//!   verify target zone exists -> upsert records
//!
//! # Responsibilities
//! - Fail-fast orchestration: any step failure halts the run and reports
//!   exactly which step broke and why. Effects of earlier steps stay in
//!   place; there is no automatic compensation.
//! - Honors a caller-supplied cancellation signal between steps.
//! - Safe to re-run from the top after a transient failure: every step
//!   except the namespace probe is idempotent (upsert/recreate semantics)
//!   or additive (content-addressed upload skips unchanged blobs).
//!
//! # Callable From
//! - The CLI crate and integration tests, with real adapters or mocks.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::contract::{DnsReconciler, NamespaceStatus, SitePublisher, UploadReport};
use crate::dns::DnsRecord;
use crate::error::{step_failure, DeployError};

/// What one successful deployment produced.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub upload: UploadReport,
    pub records: Vec<DnsRecord>,
}

fn ensure_live(cancel: &CancellationToken, step: &'static str) -> Result<(), DeployError> {
    if cancel.is_cancelled() {
        error!(step, "Deployment cancelled");
        return Err(DeployError::Cancelled(step));
    }
    Ok(())
}

/// Runs the full deployment pipeline for one target.
pub async fn deploy(
    publisher: &mut dyn SitePublisher,
    reconciler: &dyn DnsReconciler,
    base_domain: &str,
    cancel: &CancellationToken,
) -> Result<DeployOutcome, DeployError> {
    info!(base_domain, "Starting deployment pipeline");

    ensure_live(cancel, "instantiate_client")?;
    publisher
        .instantiate()
        .await
        .map_err(|e| step_failure("instantiate_client", e))?;
    info!(step = "instantiate_client", "Client ready");

    ensure_live(cancel, "verify_namespace")?;
    let status = publisher
        .verify_namespace()
        .await
        .map_err(|e| step_failure("verify_namespace", e))?;
    if status == NamespaceStatus::Taken {
        let domain = publisher.target_domain().to_string();
        error!(domain, "Namespace already taken");
        return Err(DeployError::NamespaceTaken(domain));
    }
    info!(step = "verify_namespace", "Namespace available");

    ensure_live(cancel, "create_storage")?;
    publisher
        .create_storage()
        .await
        .map_err(|e| step_failure("create_storage", e))?;
    info!(step = "create_storage", "Storage provisioned");

    ensure_live(cancel, "upload")?;
    let upload = publisher
        .upload(cancel)
        .await
        .map_err(|e| step_failure("upload", e))?;
    info!(step = "upload", files = upload.files, "Finished all uploads");

    ensure_live(cancel, "enable_domain")?;
    publisher
        .enable_domain()
        .await
        .map_err(|e| step_failure("enable_domain", e))?;
    info!(step = "enable_domain", "Content publicly addressable");

    ensure_live(cancel, "collect_dns_records")?;
    let records = publisher
        .required_dns_records()
        .map_err(|e| step_failure("collect_dns_records", e))?;
    info!(
        step = "collect_dns_records",
        records = records.len(),
        "Collected required DNS records"
    );

    ensure_live(cancel, "verify_zone")?;
    let zone_exists = reconciler
        .verify_zone_exists(base_domain)
        .await
        .map_err(|e| step_failure("verify_zone", e))?;
    if !zone_exists {
        error!(base_domain, "Hosted zone not found");
        return Err(DeployError::ZoneMissing(base_domain.to_string()));
    }
    info!(step = "verify_zone", "Base domain configured in DNS provider");

    ensure_live(cancel, "upsert_records")?;
    reconciler
        .upsert_records(base_domain, &records)
        .await
        .map_err(|e| step_failure("upsert_records", e))?;
    info!(step = "upsert_records", "Records upserted");

    Ok(DeployOutcome { upload, records })
}
