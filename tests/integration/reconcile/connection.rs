//! Connection resolution as seen by dependent resources, and the Alias/Endpoint
//! kinds themselves.

use super::harness::*;
use minio_resource_controller::controller::reconciler::Outcome;
use minio_resource_controller::crd::{
    Alias, Bucket, ConditionType, ConnectionSpec, Endpoint, HealthCheckConfig, NamespacedRef,
};
use minio_resource_controller::provider::ProviderError;
use std::time::Duration;

fn endpoint_of_last_call(h: &Harness) -> String {
    h.backend.calls().last().map(|c| c.endpoint.clone()).unwrap()
}

#[tokio::test]
async fn test_alias_not_ready_blocks_before_reading_secrets() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.lookup.put_alias(alias(ALIAS, ALIAS_URL, false));
    h.create(bucket("invoices", "invoices"));

    let report = h.settle::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("NotReadyError"));
    assert_eq!(report.requeue_after, Some(Duration::from_secs(60)));
    assert_eq!(h.lookup.secret_reads(), 0);
    assert!(h.backend.calls().is_empty());
    let status = status_of(&h.get::<Bucket>("invoices"));
    assert!(!status.ready);
    assert!(status.is_condition_true(ConditionType::Error));
}

#[tokio::test]
async fn test_missing_alias_is_not_ready() {
    let h = Harness::new();
    h.create(bucket("invoices", "invoices"));

    let report = h.settle::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("NotReadyError"));
    let status = status_of(&h.get::<Bucket>("invoices"));
    let message = status
        .condition(ConditionType::Error)
        .and_then(|c| c.message.clone())
        .unwrap();
    assert!(message.contains("default/primary"));
}

#[tokio::test]
async fn test_alias_becoming_ready_unblocks_dependents() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.lookup.put_alias(alias(ALIAS, ALIAS_URL, false));
    h.create(bucket("invoices", "invoices"));
    assert_eq!(
        failed_reason(&h.settle::<Bucket>("invoices").await),
        Some("NotReadyError")
    );

    h.lookup.put_alias(alias(ALIAS, ALIAS_URL, true));

    assert!(is_ready(&h.pass::<Bucket>("invoices").await));
    assert!(h.backend.contains("bucket", "invoices"));
}

#[tokio::test]
async fn test_ambiguous_connection_is_a_configuration_error() {
    let h = Harness::with_ready_alias();
    let mut obj = bucket("invoices", "invoices");
    obj.spec.connection.url = Some(ALIAS_URL.to_string());
    h.create(obj);

    let report = h.settle::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("ConfigurationError"));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_direct_url_with_missing_secret_is_a_secret_error() {
    let h = Harness::new();
    let mut obj = bucket("invoices", "invoices");
    obj.spec.connection = ConnectionSpec {
        url: Some("https://minio.example.com".to_string()),
        secret_ref: Some(secret_ref("absent")),
        ..ConnectionSpec::default()
    };
    h.create(obj);

    let report = h.settle::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("SecretError"));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_direct_url_reaches_the_named_server() {
    let h = Harness::new();
    h.put_credentials("direct-creds", "ak", "sk");
    let mut obj = bucket("invoices", "invoices");
    obj.spec.connection = ConnectionSpec {
        url: Some("https://minio.example.com".to_string()),
        secret_ref: Some(secret_ref("direct-creds")),
        ..ConnectionSpec::default()
    };
    h.create(obj);

    assert!(is_ready(&h.settle::<Bucket>("invoices").await));
    assert_eq!(endpoint_of_last_call(&h), "https://minio.example.com");
}

#[tokio::test]
async fn test_alias_edits_apply_on_the_next_pass() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;
    assert_eq!(endpoint_of_last_call(&h), ALIAS_URL);

    h.lookup
        .put_alias(alias(ALIAS, "http://minio-replacement:9000", true));
    assert!(is_ready(&h.pass::<Bucket>("invoices").await));

    assert_eq!(endpoint_of_last_call(&h), "http://minio-replacement:9000");
}

#[tokio::test]
async fn test_credentials_are_read_on_every_pass() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;
    let reads = h.lookup.secret_reads();

    h.put_credentials(CREDENTIALS, "rotated", "rotated-secret");
    assert!(is_ready(&h.pass::<Bucket>("invoices").await));
    assert!(h.lookup.secret_reads() > reads);

    h.lookup.remove_secret(NAMESPACE, CREDENTIALS);
    let report = h.pass::<Bucket>("invoices").await;
    assert_eq!(failed_reason(&report), Some("SecretError"));
}

#[tokio::test]
async fn test_endpoint_reference_resolves_through_ready_endpoint() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.lookup
        .put_endpoint(endpoint("legacy", "http://legacy-minio:9000", true));
    let mut obj = bucket("invoices", "invoices");
    obj.spec.connection = ConnectionSpec {
        endpoint_ref: Some(NamespacedRef {
            name: "legacy".to_string(),
            namespace: None,
        }),
        ..ConnectionSpec::default()
    };
    h.create(obj);

    assert!(is_ready(&h.settle::<Bucket>("invoices").await));
    assert_eq!(endpoint_of_last_call(&h), "http://legacy-minio:9000");
}

#[tokio::test]
async fn test_alias_probe_publishes_server_health() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.create(alias(ALIAS, ALIAS_URL, false));

    let report = h.settle::<Alias>(ALIAS).await;

    assert!(is_ready(&report));
    assert_eq!(report.requeue_after, Some(Duration::from_secs(300)));
    let status = h.get::<Alias>(ALIAS).status.unwrap();
    assert!(status.common.ready);
    assert_eq!(status.healthy, Some(true));
    assert_eq!(status.url.as_deref(), Some(ALIAS_URL));
    assert_eq!(status.version.as_deref(), Some("RELEASE.2024-06-01T00-00-00Z"));
    assert!(status.connected_at.is_some());
    assert!(status.last_health_check.is_some());
}

#[tokio::test]
async fn test_alias_health_interval_comes_from_spec() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    let mut obj = alias(ALIAS, ALIAS_URL, false);
    obj.spec.health_check = Some(HealthCheckConfig {
        enabled: true,
        interval_seconds: Some(30),
        timeout_seconds: Some(5),
    });
    h.create(obj);

    let report = h.settle::<Alias>(ALIAS).await;

    assert_eq!(report.requeue_after, Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn test_unreachable_server_marks_alias_unhealthy() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.create(alias(ALIAS, ALIAS_URL, false));
    h.settle::<Alias>(ALIAS).await;
    let connected_at = h.get::<Alias>(ALIAS).status.unwrap().connected_at;

    h.backend.set_unreachable(true);
    let report = h.pass::<Alias>(ALIAS).await;

    assert_eq!(failed_reason(&report), Some("ConnectivityError"));
    let status = h.get::<Alias>(ALIAS).status.unwrap();
    assert!(!status.common.ready);
    assert_eq!(status.healthy, Some(false));
    assert_eq!(status.connected_at, connected_at);
}

#[tokio::test]
async fn test_failed_version_lookup_only_degrades_alias() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.create(alias(ALIAS, ALIAS_URL, false));
    h.backend.fail_always(
        "server",
        "describe",
        ProviderError::UpstreamState("admin API disabled".to_string()),
    );

    let report = h.settle::<Alias>(ALIAS).await;

    assert!(matches!(
        report.outcome,
        Outcome::Ready { degraded: true, .. }
    ));
    let status = h.get::<Alias>(ALIAS).status.unwrap();
    assert_eq!(status.healthy, Some(true));
    assert!(status.common.is_condition_true(ConditionType::Degraded));
}

#[tokio::test]
async fn test_deleting_alias_makes_no_remote_calls() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.create(alias(ALIAS, ALIAS_URL, false));
    h.settle::<Alias>(ALIAS).await;
    let calls = h.backend.calls().len();

    h.delete::<Alias>(ALIAS);
    assert_eq!(h.pass::<Alias>(ALIAS).await.outcome, Outcome::Removed);

    assert_eq!(h.backend.calls().len(), calls);
    assert!(!h.exists::<Alias>(ALIAS));
}

#[tokio::test]
async fn test_endpoint_kind_reconciles_like_alias() {
    let h = Harness::new();
    h.put_credentials(CREDENTIALS, "admin", "admin-secret");
    h.create(endpoint("legacy", "http://legacy-minio:9000", false));

    let report = h.settle::<Endpoint>("legacy").await;

    assert!(is_ready(&report));
    let status = h.get::<Endpoint>("legacy").status.unwrap();
    assert_eq!(status.healthy, Some(true));
    assert_eq!(endpoint_of_last_call(&h), "http://legacy-minio:9000");
}
