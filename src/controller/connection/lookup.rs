//! Read access to the cluster objects a connection depends on.

use crate::crd::{Alias, Endpoint};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Secret payload keyed by data key
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Read-only lookups used during connection resolution
///
/// `Ok(None)` means the object does not exist.
#[async_trait]
pub trait ClusterLookup: Send + Sync + fmt::Debug {
    async fn alias(&self, namespace: &str, name: &str) -> Result<Option<Alias>, kube::Error>;

    async fn endpoint(&self, namespace: &str, name: &str)
        -> Result<Option<Endpoint>, kube::Error>;

    async fn secret(&self, namespace: &str, name: &str)
        -> Result<Option<SecretData>, kube::Error>;
}

/// Lookups against the Kubernetes API
#[derive(Clone)]
pub struct KubeLookup {
    client: Client,
}

impl fmt::Debug for KubeLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeLookup").finish_non_exhaustive()
    }
}

impl KubeLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterLookup for KubeLookup {
    async fn alias(&self, namespace: &str, name: &str) -> Result<Option<Alias>, kube::Error> {
        Api::<Alias>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn endpoint(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoint>, kube::Error> {
        Api::<Endpoint>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, kube::Error> {
        let secret = Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await?;
        Ok(secret.map(|s| {
            s.data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}

#[derive(Debug, Default)]
struct LookupState {
    aliases: HashMap<(String, String), Alias>,
    endpoints: HashMap<(String, String), Endpoint>,
    secrets: HashMap<(String, String), SecretData>,
    secret_reads: usize,
}

/// In-memory lookup for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryLookup {
    state: Arc<Mutex<LookupState>>,
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_owned(), name.to_owned())
}

fn object_key(meta: &kube::api::ObjectMeta) -> (String, String) {
    key(
        meta.namespace.as_deref().unwrap_or("default"),
        meta.name.as_deref().unwrap_or_default(),
    )
}

impl InMemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LookupState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert or replace an Alias
    pub fn put_alias(&self, alias: Alias) {
        self.state().aliases.insert(object_key(&alias.metadata), alias);
    }

    /// Insert or replace an Endpoint
    pub fn put_endpoint(&self, endpoint: Endpoint) {
        self.state()
            .endpoints
            .insert(object_key(&endpoint.metadata), endpoint);
    }

    /// Insert or replace a Secret with string values
    pub fn put_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data = data
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.as_bytes().to_vec()))
            .collect();
        self.state().secrets.insert(key(namespace, name), data);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) {
        self.state().secrets.remove(&key(namespace, name));
    }

    /// Number of secret reads served so far
    pub fn secret_reads(&self) -> usize {
        self.state().secret_reads
    }
}

#[async_trait]
impl ClusterLookup for InMemoryLookup {
    async fn alias(&self, namespace: &str, name: &str) -> Result<Option<Alias>, kube::Error> {
        Ok(self.state().aliases.get(&key(namespace, name)).cloned())
    }

    async fn endpoint(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoint>, kube::Error> {
        Ok(self.state().endpoints.get(&key(namespace, name)).cloned())
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, kube::Error> {
        let mut state = self.state();
        state.secret_reads += 1;
        Ok(state.secrets.get(&key(namespace, name)).cloned())
    }
}
