//! Finalizers, status conditions, deletion and requeue decisions, exercised
//! through the Bucket kind.

use super::harness::*;
use minio_resource_controller::controller::reconciler::{reconcile, Outcome, StoreWrite};
use minio_resource_controller::crd::{Bucket, ConditionStatus, ConditionType};
use minio_resource_controller::provider::ProviderError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_first_pass_only_attaches_finalizer() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));

    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(report.outcome, Outcome::FinalizerAttached);
    assert_eq!(report.requeue_after, Some(Duration::from_millis(500)));
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.lookup.secret_reads(), 0);
    let stored = h.get::<Bucket>("invoices");
    assert!(stored
        .metadata
        .finalizers
        .unwrap_or_default()
        .contains(&"bucket.mc-controller.mxcd.de/finalizer".to_string()));
}

#[tokio::test]
async fn test_second_pass_creates_bucket_and_reports_ready() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));

    let report = h.settle::<Bucket>("invoices").await;

    assert!(is_ready(&report));
    assert_eq!(report.requeue_after, Some(Duration::from_secs(3600)));
    assert!(h.backend.contains("bucket", "invoices"));

    let stored = h.get::<Bucket>("invoices");
    let status = stored.status.clone().unwrap();
    assert!(status.common.ready);
    assert!(status.common.is_condition_true(ConditionType::Ready));
    assert!(!status.common.is_condition_true(ConditionType::Progressing));
    assert_eq!(status.common.observed_generation, Some(1));
    assert!(status.common.last_sync_time.is_some());
    assert_eq!(status.bucket_name.as_deref(), Some("invoices"));
    assert!(status.creation_date.is_some());
}

#[tokio::test]
async fn test_repeated_passes_keep_one_remote_object() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;
    let created_at = h.get::<Bucket>("invoices").status.unwrap().creation_date;

    for _ in 0..3 {
        assert!(is_ready(&h.pass::<Bucket>("invoices").await));
    }

    let buckets: Vec<_> = h
        .backend
        .calls()
        .into_iter()
        .filter(|c| c.capability == "bucket" && c.operation == "upsert")
        .map(|c| c.name)
        .collect();
    assert_eq!(buckets, vec!["invoices"; 4]);
    assert_eq!(
        h.get::<Bucket>("invoices").status.unwrap().creation_date,
        created_at
    );
}

#[tokio::test]
async fn test_spec_change_updates_observed_generation() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;

    h.store
        .update_spec::<Bucket>(NAMESPACE, "invoices", |b| b.spec.versioning = Some(true))
        .unwrap();
    let report = h.pass::<Bucket>("invoices").await;

    assert!(is_ready(&report));
    let status = h.get::<Bucket>("invoices").status.unwrap();
    assert_eq!(status.common.observed_generation, Some(2));
}

#[tokio::test]
async fn test_remote_failure_is_reported_on_error_condition() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.pass::<Bucket>("invoices").await;
    h.backend.fail_next(
        "bucket",
        "upsert",
        ProviderError::Connectivity("connection refused".to_string()),
        1,
    );
    let finalizers = h.get::<Bucket>("invoices").metadata.finalizers;
    assert!(finalizers.as_ref().is_some_and(|f| !f.is_empty()));

    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("ConnectivityError"));
    assert_eq!(report.requeue_after, Some(Duration::from_secs(60)));
    assert_eq!(h.get::<Bucket>("invoices").metadata.finalizers, finalizers);
    let status = status_of(&h.get::<Bucket>("invoices"));
    assert!(!status.ready);
    assert!(status.is_condition_true(ConditionType::Error));
    assert_eq!(
        condition_reason(&status, ConditionType::Ready).as_deref(),
        Some("ConnectivityError")
    );
    let message = status
        .condition(ConditionType::Error)
        .and_then(|c| c.message.clone())
        .unwrap();
    assert!(message.contains("connection refused"));

    // Recovery clears the error
    let report = h.pass::<Bucket>("invoices").await;
    assert!(is_ready(&report));
    let status = status_of(&h.get::<Bucket>("invoices"));
    assert_eq!(
        status.condition(ConditionType::Error).map(|c| c.status),
        Some(ConditionStatus::False)
    );
}

#[tokio::test]
async fn test_upsert_warnings_mark_resource_degraded() {
    let h = Harness::with_ready_alias();
    h.backend.warn_on_upsert("bucket", "tagging not supported");
    h.create(bucket("invoices", "invoices"));

    let report = h.settle::<Bucket>("invoices").await;

    assert!(matches!(
        report.outcome,
        Outcome::Ready { degraded: true, .. }
    ));
    let status = status_of(&h.get::<Bucket>("invoices"));
    assert!(status.ready);
    assert!(status.is_condition_true(ConditionType::Degraded));
    assert_eq!(
        condition_reason(&status, ConditionType::Degraded).as_deref(),
        Some("PartialFailure")
    );
}

#[tokio::test]
async fn test_status_conflict_requeues_quickly_without_error() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.pass::<Bucket>("invoices").await;
    h.store.inject_status_conflicts(1);

    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(report.outcome, Outcome::Conflict);
    assert_eq!(report.requeue_after, Some(Duration::from_millis(500)));
    assert!(is_ready(&h.pass::<Bucket>("invoices").await));
}

#[tokio::test]
async fn test_finalizer_conflict_is_retried() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.store.inject_finalizer_conflicts(1);

    let report = h.pass::<Bucket>("invoices").await;
    assert_eq!(report.outcome, Outcome::Conflict);
    assert!(h.get::<Bucket>("invoices").metadata.finalizers.is_none());

    assert_eq!(
        h.pass::<Bucket>("invoices").await.outcome,
        Outcome::FinalizerAttached
    );
}

#[tokio::test]
async fn test_deletion_removes_remote_object_then_finalizer() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;

    h.delete::<Bucket>("invoices");
    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(report.outcome, Outcome::Removed);
    assert_eq!(report.requeue_after, None);
    assert!(!h.backend.contains("bucket", "invoices"));
    assert!(!h.exists::<Bucket>("invoices"));
    let removals: Vec<_> = h
        .store
        .writes()
        .into_iter()
        .filter(|w| matches!(w, StoreWrite::FinalizerRemoved { .. }))
        .collect();
    assert_eq!(
        removals,
        vec![StoreWrite::FinalizerRemoved {
            name: "invoices".to_string(),
            finalizer: "bucket.mc-controller.mxcd.de/finalizer".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_failed_cleanup_keeps_finalizer_until_it_succeeds() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;
    h.backend.fail_always(
        "bucket",
        "delete",
        ProviderError::UpstreamState("bucket not empty".to_string()),
    );

    h.delete::<Bucket>("invoices");
    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("UpstreamStateError"));
    assert_eq!(report.requeue_after, Some(Duration::from_secs(60)));
    let stored = h.get::<Bucket>("invoices");
    assert!(stored.metadata.deletion_timestamp.is_some());
    assert!(!stored.metadata.finalizers.clone().unwrap_or_default().is_empty());
    let status = status_of(&stored);
    assert!(status.is_condition_true(ConditionType::Error));
    assert_eq!(
        condition_reason(&status, ConditionType::Ready).as_deref(),
        Some("Deleting")
    );

    h.backend.clear_failures();
    assert_eq!(h.pass::<Bucket>("invoices").await.outcome, Outcome::Removed);
    assert!(!h.exists::<Bucket>("invoices"));
}

#[tokio::test]
async fn test_deleting_resource_without_finalizer_is_left_alone() {
    let h = Harness::with_ready_alias();
    let mut obj = bucket("invoices", "invoices");
    obj.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
    h.create(obj);
    h.delete::<Bucket>("invoices");

    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(report.outcome, Outcome::Gone);
    assert_eq!(report.requeue_after, None);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_own_status_write_does_not_trigger_a_new_pass() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    let ctx = Arc::clone(&h.ctx);

    reconcile(Arc::new(h.get::<Bucket>("invoices")), Arc::clone(&ctx))
        .await
        .unwrap();
    // The finalizer write schedules the next pass shortly after
    tokio::time::advance(Duration::from_millis(600)).await;
    reconcile(Arc::new(h.get::<Bucket>("invoices")), Arc::clone(&ctx))
        .await
        .unwrap();
    assert!(h.get::<Bucket>("invoices").status.is_some_and(|s| s.common.ready));
    let calls = h.backend.calls().len();

    // The stored object carries the resourceVersion written by the last pass
    reconcile(Arc::new(h.get::<Bucket>("invoices")), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(h.backend.calls().len(), calls);

    // A real spec edit produces a foreign resourceVersion and runs a pass
    h.store
        .update_spec::<Bucket>(NAMESPACE, "invoices", |b| b.spec.versioning = Some(true))
        .unwrap();
    reconcile(Arc::new(h.get::<Bucket>("invoices")), ctx)
        .await
        .unwrap();
    assert!(h.backend.calls().len() > calls);
}
