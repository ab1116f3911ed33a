//! # webhoist CLI Interface (Module)
//!
//! This module implements the full CLI interface for webhoist: argument
//! parsing, provider selection, and the async entrypoint that wires the
//! concrete adapters to the core deployment pipeline.
//!
//! All business logic (file collection, revision construction, the
//! orchestrated pipeline) lives in the `webhoist-core` crate. This module is
//! strictly CLI glue: it resolves a fully-formed publish target and a
//! provider choice, then hands off to [`webhoist_core::deploy::deploy`].
//!
//! ## How To Use
//! - Command-line users: `webhoist <domain> <folder> [--storage github|s3]`.
//! - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
//!
//! ## Extending
//! New providers get a new adapter module implementing the core contract
//! traits, plus a variant in the `ValueEnum`s below; keep all non-trivial
//! logic inside `webhoist-core`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use webhoist_core::bucket::BucketCdnPublisher;
use webhoist_core::config::{base_domain_candidates, PublishTarget};
use webhoist_core::deploy::{deploy, DeployOutcome};
use webhoist_core::dns::ZoneReconciler;
use webhoist_core::pages::PagesPublisher;

use crate::aws::{AcmCertificates, CloudFrontCdn, Route53Zones, S3ObjectStore};
use crate::github::GithubRepoStore;

/// CLI for webhoist: publish a static site folder and wire up its domain.
#[derive(Parser)]
#[clap(
    name = "webhoist",
    version,
    about = "Publish a folder of static site content to a hosting backend and point a custom domain at it"
)]
pub struct Cli {
    /// Full domain the site will serve on, e.g. www.example.com
    pub domain: String,
    /// Folder holding the site content
    pub folder: PathBuf,
    /// Object storage platform to publish to
    #[clap(long, value_enum, default_value_t = StorageProvider::Github)]
    pub storage: StorageProvider,
    /// DNS provider holding the hosted zone
    #[clap(long, value_enum, default_value_t = DnsProvider::Route53)]
    pub dns: DnsProvider,
    /// Registrable base domain; required when the full domain admits more
    /// than one candidate
    #[clap(long)]
    pub base_domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageProvider {
    /// GitHub Pages (commit-based publishing)
    Github,
    /// S3 bucket behind a CloudFront distribution
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DnsProvider {
    Route53,
}

/// Picks the base domain: a single candidate is used as-is, several require
/// the `--base-domain` flag (an interactive menu has no place in a
/// non-interactive tool).
fn resolve_base_domain(domain: &str, flag: Option<&str>) -> Result<String> {
    let mut candidates = base_domain_candidates(domain);
    if candidates.is_empty() {
        bail!("`{domain}` does not contain a registrable base domain");
    }
    match flag {
        Some(base) => {
            if !candidates.iter().any(|c| c.eq_ignore_ascii_case(base)) {
                bail!(
                    "`{base}` is not a base domain of `{domain}`; candidates: {}",
                    candidates.join(", ")
                );
            }
            Ok(base.to_string())
        }
        None if candidates.len() == 1 => Ok(candidates.remove(0)),
        None => bail!(
            "multiple possible base domains detected ({}); pass --base-domain to select one",
            candidates.join(", ")
        ),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<()> {
    let target = PublishTarget::new(&cli.domain, &cli.folder)?;
    let base_domain = resolve_base_domain(&cli.domain, cli.base_domain.as_deref())?;
    tracing::info!(domain = %cli.domain, base_domain, "Using base domain");

    let cancel = CancellationToken::new();
    let signal_guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; aborting between steps");
            signal_guard.cancel();
        }
    });

    let outcome = match cli.storage {
        StorageProvider::Github => {
            let store = GithubRepoStore::from_env().context("failed to construct GitHub client")?;
            let mut publisher = PagesPublisher::new(store, target);
            let reconciler = route53_reconciler(cli.dns).await;
            deploy(&mut publisher, &reconciler, &base_domain, &cancel).await?
        }
        StorageProvider::S3 => {
            let config = crate::aws::default_config().await;
            let mut publisher = BucketCdnPublisher::new(
                S3ObjectStore::new(&config),
                CloudFrontCdn::new(&config),
                AcmCertificates::new_us_east_1().await,
                target,
            );
            let reconciler = route53_reconciler(cli.dns).await;
            deploy(&mut publisher, &reconciler, &base_domain, &cancel).await?
        }
    };

    report(&cli.domain, &outcome);
    Ok(())
}

async fn route53_reconciler(provider: DnsProvider) -> ZoneReconciler<Route53Zones> {
    match provider {
        DnsProvider::Route53 => {
            let config = crate::aws::default_config().await;
            ZoneReconciler::new(Route53Zones::new(&config))
        }
    }
}

fn report(domain: &str, outcome: &DeployOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => tracing::debug!(json = %json, "Deployment outcome"),
        Err(e) => tracing::error!(error = ?e, "Failed to serialize deployment outcome"),
    }
    tracing::info!(
        files = outcome.upload.files,
        records = outcome.records.len(),
        "Deployment complete"
    );
    println!("Website should now be accessible at https://{domain}");
}
