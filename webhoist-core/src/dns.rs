//! DNS record model and the zone reconciler.
//!
//! The reconciler locates the hosted zone for a base domain and applies the
//! records the publisher requires as one atomic upsert batch. Matching is
//! case-insensitive after stripping a single trailing root-label separator;
//! duplicate (name, type) pairs are merged before submission because most
//! DNS backends reject duplicate keys within one batch.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::contract::{DnsReconciler, ZoneStore};
use crate::error::DnsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    Cname,
    A,
    Txt,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordType::Cname => "CNAME",
            RecordType::A => "A",
            RecordType::Txt => "TXT",
        };
        f.write_str(name)
    }
}

/// One record set to upsert: a name, a type, and an ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: i64,
    pub values: Vec<String>,
}

/// A zone as listed by the DNS backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// Backend identifier, possibly carrying a path-style prefix.
    pub id: String,
    /// Zone name, usually with a trailing dot.
    pub name: String,
}

/// True when the zone name equals the base domain, ignoring case and a
/// single trailing dot.
pub fn zone_matches(zone_name: &str, base_domain: &str) -> bool {
    let trimmed = zone_name.strip_suffix('.').unwrap_or(zone_name);
    trimmed.eq_ignore_ascii_case(base_domain)
}

/// Strips the path-style prefix some backends attach to zone identifiers.
pub fn normalize_zone_id(id: &str) -> &str {
    id.strip_prefix("/hostedzone/").unwrap_or(id)
}

/// Merges record sets that share a (name, type) key; later values win.
/// First-seen order is preserved.
pub fn merge_records(records: &[DnsRecord]) -> Vec<DnsRecord> {
    let mut merged: Vec<DnsRecord> = Vec::with_capacity(records.len());
    for record in records {
        let key = (record.name.to_ascii_lowercase(), record.record_type);
        match merged
            .iter_mut()
            .find(|r| (r.name.to_ascii_lowercase(), r.record_type) == key)
        {
            Some(existing) => {
                existing.ttl = record.ttl;
                existing.values = record.values.clone();
            }
            None => merged.push(record.clone()),
        }
    }
    merged
}

/// [`DnsReconciler`] over a pluggable [`ZoneStore`] backend.
pub struct ZoneReconciler<Z: ZoneStore> {
    zones: Z,
}

impl<Z: ZoneStore> ZoneReconciler<Z> {
    pub fn new(zones: Z) -> Self {
        Self { zones }
    }

    async fn find_zone(&self, base_domain: &str) -> Result<Option<HostedZone>, DnsError> {
        let zones = self.zones.list_zones_by_name(base_domain).await?;
        debug!(base_domain, candidates = zones.len(), "Listed candidate zones");
        // Zone names are unique per account; first match wins.
        Ok(zones.into_iter().find(|z| zone_matches(&z.name, base_domain)))
    }
}

#[async_trait]
impl<Z: ZoneStore> DnsReconciler for ZoneReconciler<Z> {
    async fn verify_zone_exists(&self, base_domain: &str) -> Result<bool, DnsError> {
        let found = self.find_zone(base_domain).await?.is_some();
        info!(base_domain, found, "Verified hosted zone");
        Ok(found)
    }

    async fn upsert_records(
        &self,
        base_domain: &str,
        records: &[DnsRecord],
    ) -> Result<(), DnsError> {
        if records.is_empty() {
            return Err(DnsError::EmptyRecordSet);
        }
        // The zone is re-resolved on every call; a cached id could have gone
        // stale between verification and application.
        let zone = self
            .find_zone(base_domain)
            .await?
            .ok_or_else(|| DnsError::ZoneNotFound(base_domain.to_string()))?;
        let zone_id = normalize_zone_id(&zone.id);

        let merged = merge_records(records);
        info!(
            base_domain,
            zone_id,
            records = merged.len(),
            "Applying record upserts as a single batch"
        );
        self.zones
            .apply_upserts(zone_id, &merged)
            .await
            .map_err(|source| DnsError::BatchApply { source })?;
        Ok(())
    }
}
