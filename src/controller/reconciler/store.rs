//! # Resource Store
//!
//! Writes to the reconciled resources themselves: finalizer changes and status
//! replacement. Every write carries the object's `resourceVersion`, so a stale
//! object is rejected with [`StoreError::Conflict`] instead of overwriting newer
//! state.

use crate::constants::FIELD_MANAGER;
use crate::crd::format_timestamp;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

/// A namespaced resource the store can read and write
pub trait StoredResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoredResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since it was read
    #[error("{0}")]
    Conflict(String),
    /// The object no longer exists
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Api(#[from] kube::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Api(kube::Error::SerdeError(error))
    }
}

/// Finalizer and status writes for reconciled resources
#[async_trait]
pub trait ResourceStore: Send + Sync + fmt::Debug {
    /// Persist `finalizer` on the object; returns the updated object
    async fn add_finalizer<K: StoredResource>(&self, obj: &K, finalizer: &str)
        -> Result<K, StoreError>;

    /// Remove `finalizer`; once no finalizers remain the API server may delete the object
    async fn remove_finalizer<K: StoredResource>(
        &self,
        obj: &K,
        finalizer: &str,
    ) -> Result<(), StoreError>;

    /// Replace the status subresource with `obj.status`; returns the updated object
    async fn replace_status<K: StoredResource>(&self, obj: &K) -> Result<K, StoreError>;
}

/// Store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoredResource>(&self, obj: &K) -> Api<K> {
        Api::namespaced(self.client.clone(), &obj.namespace().unwrap_or_default())
    }
}

fn post_params() -> PostParams {
    PostParams {
        dry_run: false,
        field_manager: Some(FIELD_MANAGER.to_string()),
    }
}

fn classify(error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(api_err.message),
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(api_err.message),
        other => StoreError::Api(other),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn add_finalizer<K: StoredResource>(
        &self,
        obj: &K,
        finalizer: &str,
    ) -> Result<K, StoreError> {
        if obj.finalizers().iter().any(|f| f == finalizer) {
            return Ok(obj.clone());
        }
        let mut updated = obj.clone();
        updated.finalizers_mut().push(finalizer.to_owned());
        self.api(obj)
            .replace(&obj.name_any(), &post_params(), &updated)
            .await
            .map_err(classify)
    }

    async fn remove_finalizer<K: StoredResource>(
        &self,
        obj: &K,
        finalizer: &str,
    ) -> Result<(), StoreError> {
        let mut updated = obj.clone();
        updated.finalizers_mut().retain(|f| f != finalizer);
        self.api(obj)
            .replace(&obj.name_any(), &post_params(), &updated)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn replace_status<K: StoredResource>(&self, obj: &K) -> Result<K, StoreError> {
        let data = serde_json::to_vec(obj)?;
        self.api(obj)
            .replace_status(&obj.name_any(), &post_params(), data)
            .await
            .map_err(classify)
    }
}

/// A write recorded by [`InMemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    FinalizerAdded { name: String, finalizer: String },
    FinalizerRemoved { name: String, finalizer: String },
    StatusReplaced { name: String },
}

type ObjectKey = (String, String, String);

fn now() -> Option<Time> {
    serde_json::from_value(serde_json::Value::String(format_timestamp(Utc::now()))).ok()
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<ObjectKey, serde_json::Value>,
    next_version: u64,
    writes: Vec<StoreWrite>,
    status_conflicts: usize,
    finalizer_conflicts: usize,
}

/// In-memory store that behaves like the API server for the operations the
/// reconcilers use: resourceVersion checks, generation bumps and deletion once
/// the last finalizer is gone.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

fn object_key<K: StoredResource>(namespace: &str, name: &str) -> ObjectKey {
    (
        K::kind(&()).into_owned(),
        namespace.to_owned(),
        name.to_owned(),
    )
}

fn key_of<K: StoredResource>(obj: &K) -> ObjectKey {
    object_key::<K>(&obj.namespace().unwrap_or_default(), &obj.name_any())
}

impl StoreState {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn load<K: StoredResource>(&self, key: &ObjectKey) -> Result<K, StoreError> {
        let value = self
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}/{} not found", key.0, key.1, key.2)))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    fn check_version<K: StoredResource>(&self, incoming: &K, stored: &K) -> Result<(), StoreError> {
        if incoming.resource_version() != stored.resource_version() {
            return Err(StoreError::Conflict(format!(
                "the object {} has been modified; please apply your changes to the latest version",
                incoming.name_any()
            )));
        }
        Ok(())
    }

    fn save<K: StoredResource>(&mut self, mut obj: K) -> Result<K, StoreError> {
        obj.meta_mut().resource_version = Some(self.bump_version());
        self.objects.insert(key_of(&obj), serde_json::to_value(&obj)?);
        Ok(obj)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Create an object the way the API server would: generation 1, fresh resourceVersion
    pub fn create<K: StoredResource>(&self, mut obj: K) -> Result<K, StoreError> {
        let meta = obj.meta_mut();
        if meta.namespace.is_none() {
            meta.namespace = Some("default".to_string());
        }
        meta.generation = Some(1);
        meta.uid = Some(format!("uid-{}", meta.name.clone().unwrap_or_default()));
        meta.creation_timestamp = now();
        self.state().save(obj)
    }

    pub fn get<K: StoredResource>(&self, namespace: &str, name: &str) -> Option<K> {
        self.state().load(&object_key::<K>(namespace, name)).ok()
    }

    /// Apply a spec change, bumping generation like the API server does
    pub fn update_spec<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
        change: impl FnOnce(&mut K),
    ) -> Result<K, StoreError> {
        let mut state = self.state();
        let mut obj: K = state.load(&object_key::<K>(namespace, name))?;
        change(&mut obj);
        let meta = obj.meta_mut();
        meta.generation = Some(meta.generation.unwrap_or(0) + 1);
        state.save(obj)
    }

    /// Mark an object for deletion; removed immediately when it has no finalizers
    pub fn request_deletion<K: StoredResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let mut state = self.state();
        let key = object_key::<K>(namespace, name);
        let mut obj: K = state.load(&key).ok()?;
        if obj.finalizers().is_empty() {
            state.objects.remove(&key);
            return None;
        }
        obj.meta_mut().deletion_timestamp = now();
        state.save(obj).ok()
    }

    /// Make the next `count` status writes fail with a conflict
    pub fn inject_status_conflicts(&self, count: usize) {
        self.state().status_conflicts = count;
    }

    /// Make the next `count` finalizer writes fail with a conflict
    pub fn inject_finalizer_conflicts(&self, count: usize) {
        self.state().finalizer_conflicts = count;
    }

    /// Every successful write, in order
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.state().writes.clone()
    }

    fn take_injected(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn add_finalizer<K: StoredResource>(
        &self,
        obj: &K,
        finalizer: &str,
    ) -> Result<K, StoreError> {
        let mut state = self.state();
        if Self::take_injected(&mut state.finalizer_conflicts) {
            return Err(StoreError::Conflict("injected finalizer conflict".to_string()));
        }
        let mut stored: K = state.load(&key_of(obj))?;
        state.check_version(obj, &stored)?;
        if stored.finalizers().iter().any(|f| f == finalizer) {
            return Ok(stored);
        }
        stored.finalizers_mut().push(finalizer.to_owned());
        let saved = state.save(stored)?;
        state.writes.push(StoreWrite::FinalizerAdded {
            name: obj.name_any(),
            finalizer: finalizer.to_owned(),
        });
        debug!(name = %obj.name_any(), finalizer, "finalizer added");
        Ok(saved)
    }

    async fn remove_finalizer<K: StoredResource>(
        &self,
        obj: &K,
        finalizer: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if Self::take_injected(&mut state.finalizer_conflicts) {
            return Err(StoreError::Conflict("injected finalizer conflict".to_string()));
        }
        let key = key_of(obj);
        let mut stored: K = state.load(&key)?;
        state.check_version(obj, &stored)?;
        stored.finalizers_mut().retain(|f| f != finalizer);
        state.writes.push(StoreWrite::FinalizerRemoved {
            name: obj.name_any(),
            finalizer: finalizer.to_owned(),
        });
        if stored.finalizers().is_empty() && stored.meta().deletion_timestamp.is_some() {
            state.objects.remove(&key);
        } else {
            state.save(stored)?;
        }
        Ok(())
    }

    async fn replace_status<K: StoredResource>(&self, obj: &K) -> Result<K, StoreError> {
        let mut state = self.state();
        if Self::take_injected(&mut state.status_conflicts) {
            return Err(StoreError::Conflict("injected status conflict".to_string()));
        }
        let key = key_of(obj);
        let stored: K = state.load(&key)?;
        state.check_version(obj, &stored)?;

        // Only the status subresource changes; spec and metadata stay as stored
        let mut value = serde_json::to_value(&stored)?;
        let incoming = serde_json::to_value(obj)?;
        if let (Some(target), Some(status)) = (value.as_object_mut(), incoming.get("status")) {
            target.insert("status".to_string(), status.clone());
        }
        let updated: K = serde_json::from_value(value)?;
        let saved = state.save(updated)?;
        state.writes.push(StoreWrite::StatusReplaced {
            name: obj.name_any(),
        });
        Ok(saved)
    }
}
