//! # In-Memory Backend
//!
//! A deterministic stand-in for an object-storage server. Objects are kept per
//! capability, every call is recorded, and failures can be injected per
//! capability and operation.

use super::{
    AttachmentDesired, BucketDesired, Capability, CapabilityClient, CapabilityFactory,
    LifecycleDesired, PolicyDesired, ProviderError, RemoteMetadata, ServerProbe, UpsertReport,
    UserDesired,
};
use crate::controller::connection::ResolvedConnectionConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Desired-state types the in-memory backend can store
pub trait MemoryObject: fmt::Debug + Send + Sync {
    /// Another object that must exist before this one can be written
    fn requires(&self, _name: &str) -> Option<(&'static str, String)> {
        None
    }
}

impl MemoryObject for ServerProbe {}
impl MemoryObject for BucketDesired {}
impl MemoryObject for UserDesired {}
impl MemoryObject for PolicyDesired {}

impl MemoryObject for AttachmentDesired {
    fn requires(&self, _name: &str) -> Option<(&'static str, String)> {
        let capability = if self.target.is_group() { "group" } else { "user" };
        Some((capability, self.target.name().to_owned()))
    }
}

impl MemoryObject for LifecycleDesired {
    fn requires(&self, name: &str) -> Option<(&'static str, String)> {
        Some(("bucket", name.to_owned()))
    }
}

/// One remote call as seen by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub capability: String,
    pub operation: &'static str,
    pub name: String,
    pub endpoint: String,
}

#[derive(Debug)]
struct Failure {
    capability: String,
    operation: String,
    error: ProviderError,
    remaining: Option<usize>,
}

#[derive(Debug)]
struct BackendState {
    objects: BTreeMap<(String, String), String>,
    calls: Vec<RecordedCall>,
    failures: Vec<Failure>,
    warnings: BTreeMap<String, Vec<String>>,
    unreachable: bool,
    version: String,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            calls: Vec::new(),
            failures: Vec::new(),
            warnings: BTreeMap::new(),
            unreachable: false,
            version: "RELEASE.2024-06-01T00-00-00Z".to_string(),
        }
    }
}

impl BackendState {
    fn injected(&mut self, capability: &str, operation: &str) -> Option<ProviderError> {
        if self.unreachable {
            return Some(ProviderError::Connectivity("server unreachable".to_string()));
        }
        let index = self.failures.iter().position(|f| {
            (f.capability == "*" || f.capability == capability)
                && (f.operation == "*" || f.operation == operation)
        })?;
        let failure = &mut self.failures[index];
        let error = failure.error.clone();
        let exhausted = match failure.remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            self.failures.remove(index);
        }
        Some(error)
    }
}

/// Shared in-memory server; clones see the same state
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put an object on the server, e.g. a group managed outside the controller
    pub fn seed(&self, capability: &str, name: &str) {
        self.state()
            .objects
            .insert((capability.to_owned(), name.to_owned()), "seeded".to_string());
    }

    pub fn contains(&self, capability: &str, name: &str) -> bool {
        self.state()
            .objects
            .contains_key(&(capability.to_owned(), name.to_owned()))
    }

    /// Debug rendering of the last desired state written for an object
    pub fn object(&self, capability: &str, name: &str) -> Option<String> {
        self.state()
            .objects
            .get(&(capability.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls for `capability` and `operation`
    pub fn count(&self, capability: &str, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.capability == capability && c.operation == operation)
            .count()
    }

    /// Fail the next `times` matching calls; `"*"` matches any capability or operation
    pub fn fail_next(&self, capability: &str, operation: &str, error: ProviderError, times: usize) {
        if times == 0 {
            return;
        }
        self.state().failures.push(Failure {
            capability: capability.to_owned(),
            operation: operation.to_owned(),
            error,
            remaining: Some(times),
        });
    }

    /// Fail every matching call until [`clear_failures`](Self::clear_failures)
    pub fn fail_always(&self, capability: &str, operation: &str, error: ProviderError) {
        self.state().failures.push(Failure {
            capability: capability.to_owned(),
            operation: operation.to_owned(),
            error,
            remaining: None,
        });
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failures.clear();
        state.unreachable = false;
    }

    /// Every call fails with a connectivity error while set
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Report `warning` from every successful upsert on `capability`
    pub fn warn_on_upsert(&self, capability: &str, warning: &str) {
        self.state()
            .warnings
            .entry(capability.to_owned())
            .or_default()
            .push(warning.to_owned());
    }

    fn client<D: MemoryObject + 'static>(
        &self,
        capability: &'static str,
        cfg: &ResolvedConnectionConfig,
    ) -> Capability<D> {
        Box::new(MemoryClient {
            state: Arc::clone(&self.state),
            capability,
            endpoint: cfg.endpoint.clone(),
            desired: PhantomData,
        })
    }
}

impl CapabilityFactory for InMemoryBackend {
    fn servers(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<ServerProbe>, ProviderError> {
        Ok(self.client("server", cfg))
    }

    fn buckets(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<BucketDesired>, ProviderError> {
        Ok(self.client("bucket", cfg))
    }

    fn users(&self, cfg: &ResolvedConnectionConfig) -> Result<Capability<UserDesired>, ProviderError> {
        Ok(self.client("user", cfg))
    }

    fn policies(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<PolicyDesired>, ProviderError> {
        Ok(self.client("policy", cfg))
    }

    fn policy_attachments(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<AttachmentDesired>, ProviderError> {
        Ok(self.client("policy_attachment", cfg))
    }

    fn lifecycle_policies(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<LifecycleDesired>, ProviderError> {
        Ok(self.client("lifecycle_policy", cfg))
    }
}

struct MemoryClient<D> {
    state: Arc<Mutex<BackendState>>,
    capability: &'static str,
    endpoint: String,
    desired: PhantomData<fn(&D)>,
}

impl<D> MemoryClient<D> {
    /// Record the call and return an injected failure, if any
    fn begin(&self, operation: &'static str, name: &str) -> (MutexGuard<'_, BackendState>, Option<ProviderError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.calls.push(RecordedCall {
            capability: self.capability.to_owned(),
            operation,
            name: name.to_owned(),
            endpoint: self.endpoint.clone(),
        });
        let failure = state.injected(self.capability, operation);
        (state, failure)
    }

    fn key(&self, name: &str) -> (String, String) {
        (self.capability.to_owned(), name.to_owned())
    }
}

#[async_trait]
impl<D: MemoryObject + 'static> CapabilityClient<D> for MemoryClient<D> {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        let (state, failure) = self.begin("exists", name);
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(state.objects.contains_key(&self.key(name)))
    }

    async fn upsert(&self, name: &str, desired: &D) -> Result<UpsertReport, ProviderError> {
        let (mut state, failure) = self.begin("upsert", name);
        if let Some(error) = failure {
            return Err(error);
        }
        if let Some((capability, dependency)) = desired.requires(name) {
            if !state
                .objects
                .contains_key(&(capability.to_owned(), dependency.clone()))
            {
                return Err(ProviderError::UpstreamState(format!(
                    "{capability} {dependency} does not exist"
                )));
            }
        }
        let previous = state
            .objects
            .insert(self.key(name), format!("{desired:?}"));
        let warnings = state
            .warnings
            .get(self.capability)
            .cloned()
            .unwrap_or_default();
        Ok(UpsertReport {
            created: previous.is_none(),
            warnings,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let (mut state, failure) = self.begin("delete", name);
        if let Some(error) = failure {
            return Err(error);
        }
        state.objects.remove(&self.key(name));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let (_state, failure) = self.begin("health_check", "");
        failure.map_or(Ok(()), Err)
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        let (state, failure) = self.begin("describe", name);
        if let Some(error) = failure {
            return Err(error);
        }
        if self.capability == "server" {
            return Ok(RemoteMetadata {
                name: name.to_owned(),
                version: Some(state.version.clone()),
                ..RemoteMetadata::default()
            });
        }
        if state.objects.contains_key(&self.key(name)) {
            Ok(RemoteMetadata {
                name: name.to_owned(),
                ..RemoteMetadata::default()
            })
        } else {
            Err(ProviderError::UpstreamState(format!(
                "{} {name} does not exist",
                self.capability
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AttachmentTarget;

    fn cfg() -> ResolvedConnectionConfig {
        ResolvedConnectionConfig {
            endpoint: "http://minio.test:9000".to_string(),
            access_key_id: "admin".to_string(),
            secret_access_key: "secret".to_string(),
            insecure_tls: false,
            path_style: true,
            region: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_reports_creation_once() {
        let backend = InMemoryBackend::new();
        let buckets = backend.buckets(&cfg()).unwrap();
        let desired = BucketDesired::default();

        assert!(buckets.upsert("logs", &desired).await.unwrap().created);
        assert!(!buckets.upsert("logs", &desired).await.unwrap().created);
        assert!(backend.contains("bucket", "logs"));
        assert_eq!(backend.count("bucket", "upsert"), 2);
    }

    #[tokio::test]
    async fn test_delete_of_absent_object_succeeds() {
        let backend = InMemoryBackend::new();
        let users = backend.users(&cfg()).unwrap();
        users.delete("ghost").await.unwrap();
        assert_eq!(backend.calls()[0].endpoint, "http://minio.test:9000");
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let backend = InMemoryBackend::new();
        backend.fail_next(
            "bucket",
            "upsert",
            ProviderError::Connectivity("timeout".to_string()),
            1,
        );
        let buckets = backend.buckets(&cfg()).unwrap();
        let desired = BucketDesired::default();

        assert!(buckets.upsert("logs", &desired).await.is_err());
        assert!(buckets.upsert("logs", &desired).await.is_ok());
    }

    #[tokio::test]
    async fn test_attachment_requires_target() {
        let backend = InMemoryBackend::new();
        let attachments = backend.policy_attachments(&cfg()).unwrap();
        let desired = AttachmentDesired {
            policy_name: "readonly".to_string(),
            target: AttachmentTarget::Group("ops".to_string()),
        };

        let err = attachments.upsert("group:ops", &desired).await.unwrap_err();
        assert!(matches!(err, ProviderError::UpstreamState(_)));

        backend.seed("group", "ops");
        assert!(attachments.upsert("group:ops", &desired).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_fails_every_call() {
        let backend = InMemoryBackend::new();
        backend.set_unreachable(true);
        let servers = backend.servers(&cfg()).unwrap();
        assert!(matches!(
            servers.health_check().await,
            Err(ProviderError::Connectivity(_))
        ));
        backend.clear_failures();
        assert!(servers.health_check().await.is_ok());
    }
}
