//! Kind-specific behaviour: policy hashing, attachment targets, lifecycle rules,
//! user passwords and immutable names.

use super::harness::*;
use minio_resource_controller::controller::reconciler::Outcome;
use minio_resource_controller::provider::ProviderError;
use minio_resource_controller::crd::{
    AttachmentTargetSpec, Bucket, LifecyclePolicy, PasswordSecretRef, Policy, PolicyAttachment,
    User, UserAccountStatus,
};

#[tokio::test]
async fn test_unchanged_policy_document_is_not_rewritten() {
    let h = Harness::with_ready_alias();
    h.create(policy("readonly", "readonly", READONLY_POLICY));
    assert!(is_ready(&h.settle::<Policy>("readonly").await));
    let hash = h.get::<Policy>("readonly").status.unwrap().policy_hash;
    assert!(hash.is_some());

    assert!(is_ready(&h.pass::<Policy>("readonly").await));
    assert_eq!(h.backend.count("policy", "upsert"), 1);

    // Reformatting alone does not change the normalized document
    let compact: String = READONLY_POLICY.split_whitespace().collect::<Vec<_>>().join(" ");
    h.store
        .update_spec::<Policy>(NAMESPACE, "readonly", |p| p.spec.policy = compact)
        .unwrap();
    assert!(is_ready(&h.pass::<Policy>("readonly").await));
    assert_eq!(h.backend.count("policy", "upsert"), 1);
    assert_eq!(h.get::<Policy>("readonly").status.unwrap().policy_hash, hash);
}

#[tokio::test]
async fn test_changed_policy_document_is_written() {
    let h = Harness::with_ready_alias();
    h.create(policy("readonly", "readonly", READONLY_POLICY));
    h.settle::<Policy>("readonly").await;
    let hash = h.get::<Policy>("readonly").status.unwrap().policy_hash;

    let widened = READONLY_POLICY.replace("s3:GetObject", "s3:*");
    h.store
        .update_spec::<Policy>(NAMESPACE, "readonly", |p| p.spec.policy = widened)
        .unwrap();
    assert!(is_ready(&h.pass::<Policy>("readonly").await));

    assert_eq!(h.backend.count("policy", "upsert"), 2);
    assert_ne!(h.get::<Policy>("readonly").status.unwrap().policy_hash, hash);
}

#[tokio::test]
async fn test_policy_missing_on_server_is_restored() {
    let h = Harness::with_ready_alias();
    h.create(policy("readonly", "readonly", READONLY_POLICY));
    h.settle::<Policy>("readonly").await;
    let applied = h.get::<Policy>("readonly");
    assert!(applied.status.as_ref().is_some_and(|s| s.policy_hash.is_some()));

    // Same resource against a server that lost its state
    let fresh = Harness::with_ready_alias();
    fresh.create(applied);
    assert!(is_ready(&fresh.pass::<Policy>("readonly").await));

    assert_eq!(fresh.backend.count("policy", "exists"), 1);
    assert_eq!(fresh.backend.count("policy", "upsert"), 1);
    assert!(fresh.backend.contains("policy", "readonly"));
}

#[tokio::test]
async fn test_invalid_policy_document_is_a_configuration_error() {
    let h = Harness::with_ready_alias();
    h.create(policy("broken", "broken", "{not json"));

    let report = h.settle::<Policy>("broken").await;

    assert_eq!(failed_reason(&report), Some("ConfigurationError"));
    assert_eq!(h.backend.count("policy", "upsert"), 0);
}

#[tokio::test]
async fn test_service_account_target_is_rejected() {
    let h = Harness::with_ready_alias();
    let target = AttachmentTargetSpec {
        service_account: Some("ci-bot".to_string()),
        ..AttachmentTargetSpec::default()
    };
    h.create(attachment("ci", "readonly", target));

    let report = h.settle::<PolicyAttachment>("ci").await;

    assert_eq!(failed_reason(&report), Some("ConfigurationError"));
    assert_eq!(h.backend.count("policy_attachment", "upsert"), 0);
}

#[tokio::test]
async fn test_attachment_waits_for_its_user() {
    let h = Harness::with_ready_alias();
    h.create(attachment("alice-readonly", "readonly", user_target("alice")));

    let report = h.settle::<PolicyAttachment>("alice-readonly").await;
    assert_eq!(failed_reason(&report), Some("UpstreamStateError"));

    h.backend.seed("user", "alice");
    assert!(is_ready(&h.pass::<PolicyAttachment>("alice-readonly").await));

    let status = h.get::<PolicyAttachment>("alice-readonly").status.unwrap();
    assert_eq!(status.target.as_deref(), Some("user:alice"));
    assert_eq!(status.policy_name.as_deref(), Some("readonly"));
    assert!(status.attached_at.is_some());
    assert!(h.backend.contains("policy_attachment", "user:alice"));
}

#[tokio::test]
async fn test_retargeted_attachment_detaches_previous_principal() {
    let h = Harness::with_ready_alias();
    h.backend.seed("user", "alice");
    h.backend.seed("group", "auditors");
    h.create(attachment("readonly", "readonly", user_target("alice")));
    h.settle::<PolicyAttachment>("readonly").await;

    h.store
        .update_spec::<PolicyAttachment>(NAMESPACE, "readonly", |a| {
            a.spec.target = AttachmentTargetSpec {
                group: Some("auditors".to_string()),
                ..AttachmentTargetSpec::default()
            }
        })
        .unwrap();
    assert!(is_ready(&h.pass::<PolicyAttachment>("readonly").await));

    assert!(!h.backend.contains("policy_attachment", "user:alice"));
    assert!(h.backend.contains("policy_attachment", "group:auditors"));
    let status = h.get::<PolicyAttachment>("readonly").status.unwrap();
    assert_eq!(status.target.as_deref(), Some("group:auditors"));
}

#[tokio::test]
async fn test_deleted_attachment_detaches_policy() {
    let h = Harness::with_ready_alias();
    h.backend.seed("user", "alice");
    h.create(attachment("readonly", "readonly", user_target("alice")));
    h.settle::<PolicyAttachment>("readonly").await;

    h.delete::<PolicyAttachment>("readonly");
    h.pass::<PolicyAttachment>("readonly").await;

    assert!(!h.backend.contains("policy_attachment", "user:alice"));
    assert!(h.backend.contains("user", "alice"));
    assert!(!h.exists::<PolicyAttachment>("readonly"));
}

#[tokio::test]
async fn test_lifecycle_rules_need_the_bucket() {
    let h = Harness::with_ready_alias();
    h.create(lifecycle("logs-expiry", "logs", vec![expire_after("expire-old", 30)]));

    let report = h.settle::<LifecyclePolicy>("logs-expiry").await;
    assert_eq!(failed_reason(&report), Some("UpstreamStateError"));

    h.backend.seed("bucket", "logs");
    assert!(is_ready(&h.pass::<LifecyclePolicy>("logs-expiry").await));

    let status = h.get::<LifecyclePolicy>("logs-expiry").status.unwrap();
    assert_eq!(status.bucket_name.as_deref(), Some("logs"));
    assert!(status.policy_hash.is_some());
    assert!(status.applied_at.is_some());
    assert!(h.backend.contains("lifecycle_policy", "logs"));
}

#[tokio::test]
async fn test_unchanged_lifecycle_rules_are_not_rewritten() {
    let h = Harness::with_ready_alias();
    h.backend.seed("bucket", "logs");
    h.create(lifecycle("logs-expiry", "logs", vec![expire_after("expire-old", 30)]));
    h.settle::<LifecyclePolicy>("logs-expiry").await;

    assert!(is_ready(&h.pass::<LifecyclePolicy>("logs-expiry").await));
    assert_eq!(h.backend.count("lifecycle_policy", "upsert"), 1);

    h.store
        .update_spec::<LifecyclePolicy>(NAMESPACE, "logs-expiry", |l| {
            l.spec.rules = vec![expire_after("expire-old", 7)]
        })
        .unwrap();
    assert!(is_ready(&h.pass::<LifecyclePolicy>("logs-expiry").await));
    assert_eq!(h.backend.count("lifecycle_policy", "upsert"), 2);
}

#[tokio::test]
async fn test_empty_rule_list_is_a_configuration_error() {
    let h = Harness::with_ready_alias();
    h.backend.seed("bucket", "logs");
    h.create(lifecycle("logs-expiry", "logs", vec![]));

    let report = h.settle::<LifecyclePolicy>("logs-expiry").await;

    assert_eq!(failed_reason(&report), Some("ConfigurationError"));
}

#[tokio::test]
async fn test_user_with_inline_password_is_created() {
    let h = Harness::with_ready_alias();
    h.create(user("alice", "alice", Some("s3cr3t-passw0rd")));

    assert!(is_ready(&h.settle::<User>("alice").await));

    assert!(h.backend.contains("user", "alice"));
    let status = h.get::<User>("alice").status.unwrap();
    assert_eq!(status.username.as_deref(), Some("alice"));
    assert_eq!(status.status, Some(UserAccountStatus::Enabled));
}

#[tokio::test]
async fn test_user_password_comes_from_secret() {
    let h = Harness::with_ready_alias();
    let mut obj = user("alice", "alice", None);
    obj.spec.password_secret_ref = Some(PasswordSecretRef {
        name: "alice-password".to_string(),
        namespace: None,
        key: None,
    });
    h.create(obj);

    let report = h.settle::<User>("alice").await;
    assert_eq!(failed_reason(&report), Some("SecretError"));
    assert!(!h.backend.contains("user", "alice"));

    h.lookup
        .put_secret(NAMESPACE, "alice-password", &[("password", "s3cr3t-passw0rd")]);
    assert!(is_ready(&h.pass::<User>("alice").await));
    assert!(h.backend.contains("user", "alice"));
}

#[tokio::test]
async fn test_user_without_password_source_is_a_configuration_error() {
    let h = Harness::with_ready_alias();
    h.create(user("alice", "alice", None));

    let report = h.settle::<User>("alice").await;

    assert_eq!(failed_reason(&report), Some("ConfigurationError"));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_bucket_rename_is_rejected() {
    let h = Harness::with_ready_alias();
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;

    h.store
        .update_spec::<Bucket>(NAMESPACE, "invoices", |b| {
            b.spec.bucket_name = "invoices-v2".to_string()
        })
        .unwrap();
    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(failed_reason(&report), Some("ConfigurationError"));
    assert!(!h.backend.contains("bucket", "invoices-v2"));
    assert!(h.backend.contains("bucket", "invoices"));
    let status = h.get::<Bucket>("invoices").status.unwrap();
    assert_eq!(status.bucket_name.as_deref(), Some("invoices"));
}

#[tokio::test]
async fn test_deletion_after_rejected_rename_removes_the_created_bucket() {
    let h = Harness::with_ready_alias();
    h.backend.seed("bucket", "invoices-v2");
    h.create(bucket("invoices", "invoices"));
    h.settle::<Bucket>("invoices").await;

    h.store
        .update_spec::<Bucket>(NAMESPACE, "invoices", |b| {
            b.spec.bucket_name = "invoices-v2".to_string()
        })
        .unwrap();
    assert_eq!(
        failed_reason(&h.pass::<Bucket>("invoices").await),
        Some("ConfigurationError")
    );

    h.delete::<Bucket>("invoices");
    let report = h.pass::<Bucket>("invoices").await;

    assert_eq!(report.outcome, Outcome::Removed);
    assert!(!h.exists::<Bucket>("invoices"));
    assert!(!h.backend.contains("bucket", "invoices"));
    assert!(h.backend.contains("bucket", "invoices-v2"));
}

#[tokio::test]
async fn test_deletion_after_rejected_rename_removes_the_created_user() {
    let h = Harness::with_ready_alias();
    h.backend.seed("user", "bob");
    h.create(user("alice", "alice", Some("s3cr3t-passw0rd")));
    h.settle::<User>("alice").await;

    h.store
        .update_spec::<User>(NAMESPACE, "alice", |u| u.spec.username = "bob".to_string())
        .unwrap();
    assert_eq!(
        failed_reason(&h.pass::<User>("alice").await),
        Some("ConfigurationError")
    );

    h.delete::<User>("alice");
    assert_eq!(h.pass::<User>("alice").await.outcome, Outcome::Removed);

    assert!(!h.backend.contains("user", "alice"));
    assert!(h.backend.contains("user", "bob"));
}

#[tokio::test]
async fn test_deleted_attachment_detaches_the_attached_target() {
    let h = Harness::with_ready_alias();
    h.backend.seed("user", "alice");
    h.create(attachment("readonly", "readonly", user_target("alice")));
    h.settle::<PolicyAttachment>("readonly").await;

    // Retarget to a principal that does not exist yet, so nothing new is attached
    h.store
        .update_spec::<PolicyAttachment>(NAMESPACE, "readonly", |a| {
            a.spec.target = user_target("carol")
        })
        .unwrap();
    h.backend.fail_always(
        "policy_attachment",
        "delete",
        ProviderError::Connectivity("connection reset".to_string()),
    );
    h.pass::<PolicyAttachment>("readonly").await;
    h.backend.clear_failures();

    h.delete::<PolicyAttachment>("readonly");
    assert_eq!(
        h.pass::<PolicyAttachment>("readonly").await.outcome,
        Outcome::Removed
    );

    assert!(!h.backend.contains("policy_attachment", "user:alice"));
}
