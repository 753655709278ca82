//! # Capability Clients
//!
//! Every remote operation the reconcilers perform goes through [`CapabilityClient`],
//! generic over the desired-state type of the resource kind it serves. A
//! [`CapabilityFactory`] builds fresh clients from a resolved connection on every
//! pass.
//!
//! ## Implementations
//!
//! - `minio` - S3 API (via `aws-sdk-s3`) and MinIO admin API (via signed `reqwest` calls)
//! - `memory` - deterministic in-memory backend with failure injection, used by tests

pub mod memory;
pub mod minio;
mod types;

pub use types::*;

use crate::controller::connection::ResolvedConnectionConfig;
use crate::observability::metrics;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors returned by capability clients
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Server unreachable, timed out, rejected credentials or failed internally
    #[error("{0}")]
    Connectivity(String),
    /// Server reachable but the requested state cannot be reached from the current one
    #[error("{0}")]
    UpstreamState(String),
    /// Request the server can never satisfy as written
    #[error("{0}")]
    Unsupported(String),
}

impl ProviderError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "connectivity",
            Self::UpstreamState(_) => "upstream_state",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// Remote operations for one kind of server-side object
///
/// Every method is safe to repeat. `delete` treats an absent object as success and
/// `upsert` creates or updates as needed.
#[async_trait]
pub trait CapabilityClient<D>: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError>;

    async fn upsert(&self, name: &str, desired: &D) -> Result<UpsertReport, ProviderError>;

    async fn delete(&self, name: &str) -> Result<(), ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError>;
}

/// Boxed client handed to reconcilers
pub type Capability<D> = Box<dyn CapabilityClient<D>>;

/// Builds capability clients for a resolved connection
pub trait CapabilityFactory: Send + Sync + fmt::Debug {
    fn servers(&self, cfg: &ResolvedConnectionConfig)
        -> Result<Capability<ServerProbe>, ProviderError>;

    fn buckets(&self, cfg: &ResolvedConnectionConfig)
        -> Result<Capability<BucketDesired>, ProviderError>;

    fn users(&self, cfg: &ResolvedConnectionConfig) -> Result<Capability<UserDesired>, ProviderError>;

    fn policies(&self, cfg: &ResolvedConnectionConfig)
        -> Result<Capability<PolicyDesired>, ProviderError>;

    fn policy_attachments(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<AttachmentDesired>, ProviderError>;

    fn lifecycle_policies(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<LifecycleDesired>, ProviderError>;
}

/// Wraps a client to record per-operation metrics and debug logs
pub struct Instrumented<D> {
    inner: Capability<D>,
    capability: &'static str,
}

impl<D> fmt::Debug for Instrumented<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

impl<D> Instrumented<D> {
    pub fn new(inner: Capability<D>, capability: &'static str) -> Self {
        Self { inner, capability }
    }

    fn record<T>(&self, operation: &str, result: &Result<T, ProviderError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => e.as_str(),
        };
        debug!(
            capability = self.capability,
            operation, outcome, "remote operation finished"
        );
        metrics::increment_remote_operations(self.capability, operation, outcome);
    }
}

#[async_trait]
impl<D> CapabilityClient<D> for Instrumented<D>
where
    D: Send + Sync,
{
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        let result = self.inner.exists(name).await;
        self.record("exists", &result);
        result
    }

    async fn upsert(&self, name: &str, desired: &D) -> Result<UpsertReport, ProviderError> {
        let result = self.inner.upsert(name, desired).await;
        self.record("upsert", &result);
        result
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let result = self.inner.delete(name).await;
        self.record("delete", &result);
        result
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let result = self.inner.health_check().await;
        self.record("health_check", &result);
        result
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        let result = self.inner.describe(name).await;
        self.record("describe", &result);
        result
    }
}
