//! # Reconciler Types
//!
//! The shared reconcile context and the error taxonomy.

use super::recent::RecentWrites;
use super::requeue::{FixedIntervalScheduler, RequeueScheduler};
use super::store::{KubeStore, StoreError};
use crate::config::ControllerConfig;
use crate::controller::connection::{ClusterLookup, ResolutionError};
use crate::provider::{CapabilityFactory, ProviderError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Everything a reconcile pass needs, built once at startup
///
/// Passed explicitly into every pass; the controller holds no process-wide
/// registry of clients.
pub struct Context<S = KubeStore> {
    /// Writes to the reconciled resources (finalizers, status)
    pub store: S,
    /// Reads Alias, Endpoint and Secret objects
    pub lookup: Arc<dyn ClusterLookup>,
    /// Builds capability clients from resolved connections
    pub factory: Arc<dyn CapabilityFactory>,
    pub scheduler: Arc<dyn RequeueScheduler>,
    pub config: Arc<ControllerConfig>,
    /// Versions written by recent passes, used to skip our own watch events
    pub recent_writes: RecentWrites,
}

impl<S> Context<S> {
    /// Context with the fixed-interval scheduler derived from `config`
    pub fn new(
        store: S,
        lookup: Arc<dyn ClusterLookup>,
        factory: Arc<dyn CapabilityFactory>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            lookup,
            factory,
            scheduler: Arc::new(FixedIntervalScheduler::from_config(&config)),
            config: Arc::new(config),
            recent_writes: RecentWrites::new(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Context<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("store", &self.store)
            .field("lookup", &self.lookup)
            .field("factory", &self.factory)
            .field("scheduler", &self.scheduler)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Errors produced while reconciling a resource
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Invalid or incomplete spec; fixed only by editing the resource
    #[error("{0}")]
    Configuration(String),

    /// A referenced Alias or Endpoint is missing or not Ready
    #[error("{0}")]
    NotReady(String),

    /// Credentials secret or key missing
    #[error("{0}")]
    Secret(String),

    /// Server unreachable, timed out or rejected the credentials
    #[error("{0}")]
    Connectivity(String),

    /// Optimistic-concurrency conflict while writing the resource
    #[error("conflict writing resource: {0}")]
    Conflict(String),

    /// Server reachable but refused the requested state transition
    #[error("{0}")]
    UpstreamState(String),

    /// The resource was deleted while the pass was running
    #[error("resource no longer exists: {0}")]
    Gone(String),

    /// Reading or writing Kubernetes objects failed
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcilerError {
    /// Stable reason string, used as condition reason and metrics label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::NotReady(_) => "NotReadyError",
            Self::Secret(_) => "SecretError",
            Self::Connectivity(_) => "ConnectivityError",
            Self::Conflict(_) => "ConflictError",
            Self::UpstreamState(_) => "UpstreamStateError",
            Self::Gone(_) => "NotFound",
            Self::Kube(_) => "KubernetesAPIError",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<ResolutionError> for ReconcilerError {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::Configuration(message) => Self::Configuration(message),
            ResolutionError::NotReady(message) => Self::NotReady(message),
            ResolutionError::Secret(message) => Self::Secret(message),
            ResolutionError::Lookup { source, .. } => Self::Kube(source),
        }
    }
}

impl From<ProviderError> for ReconcilerError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Connectivity(message) => Self::Connectivity(message),
            ProviderError::UpstreamState(message) => Self::UpstreamState(message),
            ProviderError::Unsupported(message) => Self::Configuration(message),
        }
    }
}

impl From<StoreError> for ReconcilerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::NotFound(message) => Self::Gone(message),
            StoreError::Api(source) => Self::Kube(source),
        }
    }
}
