//! Bucket lifecycle configuration. Like policies, the rule set is hashed and only
//! pushed when it changed or the configuration is missing on the server.

use super::super::lifecycle::{Convergence, ManagedResource};
use super::super::types::ReconcilerError;
use super::super::validation::{validate_bucket_name, validate_lifecycle_rules};
use super::{dependent_connection, ensure_unchanged, invalid, recorded_or_current, sha256_hex};
use crate::config::ControllerConfig;
use crate::controller::connection::{ClusterLookup, ConnectionReference, ResolvedConnectionConfig};
use crate::crd::{format_timestamp, LifecyclePolicy, ResourceStatus};
use crate::provider::{
    Capability, CapabilityClient, CapabilityFactory, LifecycleDesired, ProviderError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

pub const LIFECYCLE_POLICY_FINALIZER: &str = "lifecyclepolicy.mc-controller.mxcd.de/finalizer";

#[async_trait]
impl ManagedResource for LifecyclePolicy {
    type Desired = LifecycleDesired;

    const KIND: &'static str = "LifecyclePolicy";
    const FINALIZER: &'static str = LIFECYCLE_POLICY_FINALIZER;
    const CAPABILITY: &'static str = "lifecycle_policy";

    fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        dependent_connection(&self.spec.connection)
    }

    fn remote_name(&self) -> String {
        self.spec.bucket_name.clone()
    }

    fn cleanup_name(&self) -> String {
        recorded_or_current(
            self.status.as_ref().and_then(|s| s.bucket_name.as_deref()),
            &self.spec.bucket_name,
        )
    }

    async fn desired_state(
        &self,
        _lookup: &dyn ClusterLookup,
    ) -> Result<LifecycleDesired, ReconcilerError> {
        validate_bucket_name(&self.spec.bucket_name).map_err(invalid)?;
        ensure_unchanged(
            "bucketName",
            self.status.as_ref().and_then(|s| s.bucket_name.as_deref()),
            &self.spec.bucket_name,
        )?;
        validate_lifecycle_rules(&self.spec.rules).map_err(invalid)?;

        let canonical = serde_json::to_vec(&self.spec.rules).map_err(|e| {
            ReconcilerError::Configuration(format!("rules cannot be serialized: {e}"))
        })?;
        Ok(LifecycleDesired {
            rules: self.spec.rules.clone(),
            hash: sha256_hex(&canonical),
        })
    }

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<LifecycleDesired>, ProviderError> {
        factory.lifecycle_policies(cfg)
    }

    async fn converge(
        &self,
        client: &dyn CapabilityClient<LifecycleDesired>,
        desired: &LifecycleDesired,
        _config: &ControllerConfig,
    ) -> Result<Convergence, ReconcilerError> {
        let bucket = self.remote_name();
        let applied = self.status.as_ref().and_then(|s| s.policy_hash.as_deref());
        if applied == Some(desired.hash.as_str()) && client.exists(&bucket).await? {
            debug!(bucket = %bucket, "lifecycle rules unchanged");
            return Ok(Convergence::default());
        }
        let report = client.upsert(&bucket, desired).await?;
        // Any write counts as a fresh application of the rules
        Ok(Convergence {
            created: true,
            remote: None,
            warnings: report.warnings,
        })
    }

    fn status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref().map(|s| &s.common)
    }

    fn status_mut(&mut self) -> &mut ResourceStatus {
        &mut self.status.get_or_insert_with(Default::default).common
    }

    fn project(
        &mut self,
        desired: &LifecycleDesired,
        convergence: &Convergence,
        now: DateTime<Utc>,
    ) {
        let bucket_name = self.spec.bucket_name.clone();
        let status = self.status.get_or_insert_with(Default::default);
        status.bucket_name = Some(bucket_name);
        status.policy_hash = Some(desired.hash.clone());
        if convergence.created || status.applied_at.is_none() {
            status.applied_at = Some(format_timestamp(now));
        }
    }
}
