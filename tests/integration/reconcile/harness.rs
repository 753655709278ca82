//! Shared fixtures: a context wired to in-memory store, lookup and backend, plus
//! builders for each resource kind.

use minio_resource_controller::config::ControllerConfig;
use minio_resource_controller::controller::connection::InMemoryLookup;
use minio_resource_controller::controller::reconciler::{
    reconcile_resource, Context, InMemoryStore, ManagedResource, Outcome, PassReport,
};
use minio_resource_controller::crd::{
    Alias, AliasSpec, AttachmentTargetSpec, Bucket, BucketSpec, ConditionType, ConnectionSpec,
    Endpoint, EndpointSpec, Expiration, LifecyclePolicy, LifecyclePolicySpec, LifecycleRule,
    NamespacedRef, Policy, PolicyAttachment, PolicyAttachmentSpec, PolicySpec, ResourceStatus,
    RuleStatus, SecretReference, ServerConnectionStatus, User, UserAccountStatus, UserSpec,
};
use minio_resource_controller::provider::memory::InMemoryBackend;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "default";
pub const ALIAS: &str = "primary";
pub const ALIAS_URL: &str = "http://minio.storage:9000";
pub const CREDENTIALS: &str = "minio-creds";

pub struct Harness {
    pub store: InMemoryStore,
    pub lookup: InMemoryLookup,
    pub backend: InMemoryBackend,
    pub ctx: Arc<Context<InMemoryStore>>,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let lookup = InMemoryLookup::new();
        let backend = InMemoryBackend::new();
        let ctx = Arc::new(Context::new(
            store.clone(),
            Arc::new(lookup.clone()),
            Arc::new(backend.clone()),
            ControllerConfig::default(),
        ));
        Self {
            store,
            lookup,
            backend,
            ctx,
        }
    }

    /// Harness with credentials and a Ready Alias named [`ALIAS`]
    pub fn with_ready_alias() -> Self {
        let harness = Self::new();
        harness.put_credentials(CREDENTIALS, "admin", "admin-secret");
        harness.lookup.put_alias(alias(ALIAS, ALIAS_URL, true));
        harness
    }

    pub fn put_credentials(&self, name: &str, access_key: &str, secret_key: &str) {
        self.lookup.put_secret(
            NAMESPACE,
            name,
            &[("accessKeyID", access_key), ("secretAccessKey", secret_key)],
        );
    }

    pub fn create<K: ManagedResource>(&self, obj: K) -> K {
        self.store.create(obj).unwrap()
    }

    pub fn get<K: ManagedResource>(&self, name: &str) -> K {
        self.store
            .get::<K>(NAMESPACE, name)
            .unwrap_or_else(|| panic!("{} {name} not found", K::KIND))
    }

    pub fn exists<K: ManagedResource>(&self, name: &str) -> bool {
        self.store.get::<K>(NAMESPACE, name).is_some()
    }

    /// One pass over the stored object
    pub async fn pass<K: ManagedResource>(&self, name: &str) -> PassReport {
        let obj = self.get::<K>(name);
        reconcile_resource(Arc::new(obj), Arc::clone(&self.ctx))
            .await
            .unwrap()
    }

    /// Attach the finalizer, then run the first real pass
    pub async fn settle<K: ManagedResource>(&self, name: &str) -> PassReport {
        let first = self.pass::<K>(name).await;
        assert_eq!(first.outcome, Outcome::FinalizerAttached);
        self.pass::<K>(name).await
    }

    pub fn delete<K: ManagedResource>(&self, name: &str) {
        self.store.request_deletion::<K>(NAMESPACE, name);
    }
}

pub fn status_of<K: ManagedResource>(obj: &K) -> ResourceStatus {
    obj.status().cloned().unwrap_or_default()
}

pub fn condition_reason(status: &ResourceStatus, condition: ConditionType) -> Option<String> {
    status.condition(condition).and_then(|c| c.reason.clone())
}

pub fn failed_reason(report: &PassReport) -> Option<&'static str> {
    match &report.outcome {
        Outcome::Failed { reason, .. } | Outcome::CleanupFailed { reason, .. } => Some(reason),
        _ => None,
    }
}

pub fn is_ready(report: &PassReport) -> bool {
    matches!(report.outcome, Outcome::Ready { .. })
}

fn named<K: kube::Resource>(mut obj: K) -> K {
    obj.meta_mut().namespace = Some(NAMESPACE.to_string());
    obj
}

pub fn secret_ref(name: &str) -> SecretReference {
    SecretReference {
        name: name.to_string(),
        namespace: None,
        access_key_id_key: None,
        secret_access_key_key: None,
    }
}

pub fn ready_status() -> ServerConnectionStatus {
    ServerConnectionStatus {
        common: ResourceStatus {
            ready: true,
            ..ResourceStatus::default()
        },
        ..ServerConnectionStatus::default()
    }
}

pub fn alias_spec(url: &str) -> AliasSpec {
    AliasSpec {
        url: url.to_string(),
        secret_ref: secret_ref(CREDENTIALS),
        tls: None,
        health_check: None,
        region: None,
        path_style: true,
        description: None,
        tags: BTreeMap::new(),
    }
}

pub fn alias(name: &str, url: &str, ready: bool) -> Alias {
    let mut alias = named(Alias::new(name, alias_spec(url)));
    if ready {
        alias.status = Some(ready_status());
    }
    alias
}

pub fn endpoint(name: &str, url: &str, ready: bool) -> Endpoint {
    let mut endpoint = named(Endpoint::new(
        name,
        EndpointSpec {
            url: url.to_string(),
            secret_ref: secret_ref(CREDENTIALS),
            tls: None,
            health_check: None,
            region: None,
            path_style: true,
        },
    ));
    if ready {
        endpoint.status = Some(ready_status());
    }
    endpoint
}

pub fn via_alias() -> ConnectionSpec {
    ConnectionSpec {
        alias_ref: Some(NamespacedRef {
            name: ALIAS.to_string(),
            namespace: None,
        }),
        ..ConnectionSpec::default()
    }
}

pub fn bucket(name: &str, bucket_name: &str) -> Bucket {
    named(Bucket::new(
        name,
        BucketSpec {
            connection: via_alias(),
            bucket_name: bucket_name.to_string(),
            region: None,
            object_locking: false,
            versioning: None,
            tags: BTreeMap::new(),
        },
    ))
}

pub fn user(name: &str, username: &str, password: Option<&str>) -> User {
    named(User::new(
        name,
        UserSpec {
            connection: via_alias(),
            username: username.to_string(),
            password: password.map(str::to_string),
            password_secret_ref: None,
            status: UserAccountStatus::Enabled,
            groups: vec![],
            policies: vec![],
        },
    ))
}

pub const READONLY_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {"Effect": "Allow", "Action": ["s3:GetObject"], "Resource": ["arn:aws:s3:::invoices/*"]}
    ]
}"#;

pub fn policy(name: &str, policy_name: &str, document: &str) -> Policy {
    named(Policy::new(
        name,
        PolicySpec {
            connection: via_alias(),
            policy_name: policy_name.to_string(),
            policy: document.to_string(),
            description: None,
        },
    ))
}

pub fn attachment(name: &str, policy_name: &str, target: AttachmentTargetSpec) -> PolicyAttachment {
    named(PolicyAttachment::new(
        name,
        PolicyAttachmentSpec {
            connection: via_alias(),
            policy_name: policy_name.to_string(),
            target,
        },
    ))
}

pub fn user_target(user: &str) -> AttachmentTargetSpec {
    AttachmentTargetSpec {
        user: Some(user.to_string()),
        ..AttachmentTargetSpec::default()
    }
}

pub fn expire_after(id: &str, days: i32) -> LifecycleRule {
    LifecycleRule {
        id: id.to_string(),
        status: RuleStatus::Enabled,
        filter: None,
        expiration: Some(Expiration {
            days: Some(days),
            ..Expiration::default()
        }),
        noncurrent_version_expiration: None,
        abort_incomplete_multipart_upload: None,
        transitions: vec![],
        noncurrent_version_transitions: vec![],
    }
}

pub fn lifecycle(name: &str, bucket_name: &str, rules: Vec<LifecycleRule>) -> LifecyclePolicy {
    named(LifecyclePolicy::new(
        name,
        LifecyclePolicySpec {
            connection: via_alias(),
            bucket_name: bucket_name.to_string(),
            rules,
        },
    ))
}
