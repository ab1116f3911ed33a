use webhoist_core::contract::{DnsReconciler, MockZoneStore};
use webhoist_core::dns::{DnsRecord, HostedZone, RecordType, ZoneReconciler};
use webhoist_core::error::{DnsError, ProviderError};

fn zone(id: &str, name: &str) -> HostedZone {
    HostedZone {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn cname(name: &str, value: &str) -> DnsRecord {
    DnsRecord {
        name: name.to_string(),
        record_type: RecordType::Cname,
        ttl: 300,
        values: vec![value.to_string()],
    }
}

#[tokio::test]
async fn zone_verification_matches_despite_case_and_trailing_dot() {
    let mut zones = MockZoneStore::new();
    zones
        .expect_list_zones_by_name()
        .withf(|name: &str| name == "example.com")
        .return_once(|_| Ok(vec![zone("/hostedzone/Z1", "Example.COM.")]));

    let reconciler = ZoneReconciler::new(zones);
    let found = reconciler
        .verify_zone_exists("example.com")
        .await
        .expect("verification should succeed");

    assert!(found);
}

#[tokio::test]
async fn zone_verification_miss_is_false_not_an_error() {
    let mut zones = MockZoneStore::new();
    // The backend lists lexicographic successors too; none matches exactly.
    zones
        .expect_list_zones_by_name()
        .return_once(|_| Ok(vec![zone("/hostedzone/Z9", "example.org.")]));

    let reconciler = ZoneReconciler::new(zones);
    let found = reconciler
        .verify_zone_exists("example.com")
        .await
        .expect("verification should succeed");

    assert!(!found);
}

#[tokio::test]
async fn upsert_strips_the_zone_id_prefix_and_batches_once() {
    let mut zones = MockZoneStore::new();
    zones
        .expect_list_zones_by_name()
        .return_once(|_| Ok(vec![zone("/hostedzone/Z1", "example.com.")]));
    zones
        .expect_apply_upserts()
        .times(1)
        .withf(|zone_id: &str, records| {
            zone_id == "Z1" && records.len() == 1 && records[0].name == "site.example.com."
        })
        .return_once(|_, _| Ok(()));

    let reconciler = ZoneReconciler::new(zones);
    reconciler
        .upsert_records(
            "example.com",
            &[cname("site.example.com.", "octocat.github.io")],
        )
        .await
        .expect("upsert should succeed");
}

#[tokio::test]
async fn repeated_upsert_re_resolves_the_zone_and_reapplies_the_same_batch() {
    let mut zones = MockZoneStore::new();
    // A cached zone id could go stale between calls; each call looks the
    // zone up again and submits the identical upsert batch.
    zones
        .expect_list_zones_by_name()
        .times(2)
        .returning(|_| Ok(vec![zone("/hostedzone/Z1", "example.com.")]));
    zones
        .expect_apply_upserts()
        .times(2)
        .withf(|zone_id: &str, records| {
            zone_id == "Z1"
                && records.len() == 1
                && records[0].values == vec!["octocat.github.io".to_string()]
        })
        .returning(|_, _| Ok(()));

    let reconciler = ZoneReconciler::new(zones);
    let batch = [cname("site.example.com.", "octocat.github.io")];
    for _ in 0..2 {
        reconciler
            .upsert_records("example.com", &batch)
            .await
            .expect("upsert should succeed every time");
    }
}

#[tokio::test]
async fn duplicate_record_keys_are_merged_with_later_values_winning() {
    let mut zones = MockZoneStore::new();
    zones
        .expect_list_zones_by_name()
        .return_once(|_| Ok(vec![zone("Z1", "example.com")]));
    zones
        .expect_apply_upserts()
        .withf(|_, records| {
            records.len() == 1 && records[0].values == vec!["second.target".to_string()]
        })
        .return_once(|_, _| Ok(()));

    let reconciler = ZoneReconciler::new(zones);
    reconciler
        .upsert_records(
            "example.com",
            &[
                cname("site.example.com.", "first.target"),
                cname("site.example.com.", "second.target"),
            ],
        )
        .await
        .expect("upsert should succeed");
}

#[tokio::test]
async fn empty_record_set_is_refused_without_touching_the_backend() {
    let mut zones = MockZoneStore::new();
    zones.expect_list_zones_by_name().times(0);
    zones.expect_apply_upserts().times(0);

    let reconciler = ZoneReconciler::new(zones);
    let err = reconciler
        .upsert_records("example.com", &[])
        .await
        .expect_err("empty upsert should fail");

    assert!(matches!(err, DnsError::EmptyRecordSet));
}

#[tokio::test]
async fn upsert_into_a_vanished_zone_fails_with_zone_not_found() {
    let mut zones = MockZoneStore::new();
    zones
        .expect_list_zones_by_name()
        .return_once(|_| Ok(vec![]));
    zones.expect_apply_upserts().times(0);

    let reconciler = ZoneReconciler::new(zones);
    let err = reconciler
        .upsert_records("example.com", &[cname("site.example.com.", "target")])
        .await
        .expect_err("upsert should fail");

    assert!(matches!(err, DnsError::ZoneNotFound(domain) if domain == "example.com"));
}

#[tokio::test]
async fn rejected_batch_is_reported_as_batch_apply() {
    let mut zones = MockZoneStore::new();
    zones
        .expect_list_zones_by_name()
        .return_once(|_| Ok(vec![zone("Z1", "example.com.")]));
    zones
        .expect_apply_upserts()
        .return_once(|_, _| Err(ProviderError::backend("InvalidChangeBatch")));

    let reconciler = ZoneReconciler::new(zones);
    let err = reconciler
        .upsert_records("example.com", &[cname("site.example.com.", "target")])
        .await
        .expect_err("upsert should fail");

    assert!(matches!(err, DnsError::BatchApply { .. }));
}
