//! Canned policy reconciliation. The document is normalized and hashed; the
//! server is only written when the hash differs from the last applied one or the
//! policy went missing.

use super::super::lifecycle::{Convergence, ManagedResource};
use super::super::types::ReconcilerError;
use super::super::validation::{normalize_policy_document, validate_principal_name};
use super::{dependent_connection, ensure_unchanged, invalid, recorded_or_current, sha256_hex};
use crate::config::ControllerConfig;
use crate::controller::connection::{ClusterLookup, ConnectionReference, ResolvedConnectionConfig};
use crate::crd::{format_timestamp, Policy, ResourceStatus};
use crate::provider::{Capability, CapabilityClient, CapabilityFactory, PolicyDesired, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

pub const POLICY_FINALIZER: &str = "policy.mc-controller.mxcd.de/finalizer";

#[async_trait]
impl ManagedResource for Policy {
    type Desired = PolicyDesired;

    const KIND: &'static str = "Policy";
    const FINALIZER: &'static str = POLICY_FINALIZER;
    const CAPABILITY: &'static str = "policy";

    fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        dependent_connection(&self.spec.connection)
    }

    fn remote_name(&self) -> String {
        self.spec.policy_name.clone()
    }

    fn cleanup_name(&self) -> String {
        recorded_or_current(
            self.status.as_ref().and_then(|s| s.policy_name.as_deref()),
            &self.spec.policy_name,
        )
    }

    async fn desired_state(
        &self,
        _lookup: &dyn ClusterLookup,
    ) -> Result<PolicyDesired, ReconcilerError> {
        validate_principal_name(&self.spec.policy_name, "policyName").map_err(invalid)?;
        ensure_unchanged(
            "policyName",
            self.status.as_ref().and_then(|s| s.policy_name.as_deref()),
            &self.spec.policy_name,
        )?;
        let document = normalize_policy_document(&self.spec.policy).map_err(invalid)?;
        let hash = sha256_hex(document.as_bytes());
        Ok(PolicyDesired { document, hash })
    }

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<PolicyDesired>, ProviderError> {
        factory.policies(cfg)
    }

    async fn converge(
        &self,
        client: &dyn CapabilityClient<PolicyDesired>,
        desired: &PolicyDesired,
        _config: &ControllerConfig,
    ) -> Result<Convergence, ReconcilerError> {
        let name = self.remote_name();
        let applied = self.status.as_ref().and_then(|s| s.policy_hash.as_deref());
        if applied == Some(desired.hash.as_str()) && client.exists(&name).await? {
            debug!(policy = %name, "policy unchanged");
            return Ok(Convergence::default());
        }
        let report = client.upsert(&name, desired).await?;
        Ok(Convergence {
            created: report.created,
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

    fn project(&mut self, desired: &PolicyDesired, convergence: &Convergence, now: DateTime<Utc>) {
        let policy_name = self.spec.policy_name.clone();
        let status = self.status.get_or_insert_with(Default::default);
        status.policy_name = Some(policy_name);
        status.policy_hash = Some(desired.hash.clone());
        if convergence.created || status.creation_date.is_none() {
            status.creation_date = Some(format_timestamp(now));
        }
    }
}
