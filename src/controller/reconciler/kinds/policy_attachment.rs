//! Attaching a canned policy to a user or group.

use super::super::lifecycle::{Convergence, ManagedResource};
use super::super::types::ReconcilerError;
use super::super::validation::validate_principal_name;
use super::{dependent_connection, invalid};
use crate::controller::connection::{ClusterLookup, ConnectionReference, ResolvedConnectionConfig};
use crate::crd::{format_timestamp, AttachmentTargetSpec, PolicyAttachment, ResourceStatus};
use crate::config::ControllerConfig;
use crate::provider::{
    AttachmentDesired, AttachmentTarget, Capability, CapabilityClient, CapabilityFactory,
    ProviderError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

pub const POLICY_ATTACHMENT_FINALIZER: &str = "policyattachment.mc-controller.mxcd.de/finalizer";

/// Exactly one of user, group or serviceAccount; service accounts are not supported
pub fn attachment_target(spec: &AttachmentTargetSpec) -> Result<AttachmentTarget, ReconcilerError> {
    let target = match (&spec.user, &spec.group, &spec.service_account) {
        (Some(user), None, None) => AttachmentTarget::User(user.clone()),
        (None, Some(group), None) => AttachmentTarget::Group(group.clone()),
        (None, None, Some(_)) => {
            return Err(ReconcilerError::Configuration(
                "policy attachment to service accounts is not supported".to_string(),
            ))
        }
        (None, None, None) => {
            return Err(ReconcilerError::Configuration(
                "target must set one of user, group or serviceAccount".to_string(),
            ))
        }
        _ => {
            return Err(ReconcilerError::Configuration(
                "target must set only one of user, group or serviceAccount".to_string(),
            ))
        }
    };
    validate_principal_name(target.name(), "target").map_err(invalid)?;
    Ok(target)
}

#[async_trait]
impl ManagedResource for PolicyAttachment {
    type Desired = AttachmentDesired;

    const KIND: &'static str = "PolicyAttachment";
    const FINALIZER: &'static str = POLICY_ATTACHMENT_FINALIZER;
    const CAPABILITY: &'static str = "policy_attachment";

    fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        dependent_connection(&self.spec.connection)
    }

    /// `user:<name>` or `group:<name>`; the last attached target when the spec no longer parses
    fn remote_name(&self) -> String {
        match attachment_target(&self.spec.target) {
            Ok(target) => target.key(),
            Err(_) => self
                .status
                .as_ref()
                .and_then(|s| s.target.clone())
                .unwrap_or_default(),
        }
    }

    fn cleanup_name(&self) -> String {
        match self.status.as_ref().and_then(|s| s.target.clone()) {
            Some(attached) => attached,
            None => self.remote_name(),
        }
    }

    async fn desired_state(
        &self,
        _lookup: &dyn ClusterLookup,
    ) -> Result<AttachmentDesired, ReconcilerError> {
        validate_principal_name(&self.spec.policy_name, "policyName").map_err(invalid)?;
        Ok(AttachmentDesired {
            policy_name: self.spec.policy_name.clone(),
            target: attachment_target(&self.spec.target)?,
        })
    }

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<AttachmentDesired>, ProviderError> {
        factory.policy_attachments(cfg)
    }

    async fn converge(
        &self,
        client: &dyn CapabilityClient<AttachmentDesired>,
        desired: &AttachmentDesired,
        _config: &ControllerConfig,
    ) -> Result<Convergence, ReconcilerError> {
        let key = desired.target.key();
        // Retargeted: detach from the previous principal first
        if let Some(previous) = self.status.as_ref().and_then(|s| s.target.as_deref()) {
            if previous != key {
                info!(previous, target = %key, "attachment target changed, detaching previous");
                client.delete(previous).await?;
            }
        }
        let report = client.upsert(&key, desired).await?;
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

    fn project(
        &mut self,
        desired: &AttachmentDesired,
        _convergence: &Convergence,
        now: DateTime<Utc>,
    ) {
        let status = self.status.get_or_insert_with(Default::default);
        let key = desired.target.key();
        if status.target.as_deref() != Some(key.as_str()) {
            status.attached_at = None;
        }
        status.policy_name = Some(desired.policy_name.clone());
        status.target = Some(key);
        if status.attached_at.is_none() {
            status.attached_at = Some(format_timestamp(now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(user: Option<&str>, group: Option<&str>, sa: Option<&str>) -> AttachmentTargetSpec {
        AttachmentTargetSpec {
            user: user.map(str::to_string),
            group: group.map(str::to_string),
            service_account: sa.map(str::to_string),
        }
    }

    #[test]
    fn test_single_user_or_group_target() {
        assert_eq!(
            attachment_target(&target(Some("alice"), None, None)).unwrap(),
            AttachmentTarget::User("alice".to_string())
        );
        assert_eq!(
            attachment_target(&target(None, Some("ops"), None)).unwrap(),
            AttachmentTarget::Group("ops".to_string())
        );
    }

    #[test]
    fn test_service_account_target_is_rejected() {
        let err = attachment_target(&target(None, None, Some("ci"))).unwrap_err();
        assert_eq!(err.reason(), "ConfigurationError");
        assert!(err.to_string().contains("service accounts"));
    }

    #[test]
    fn test_zero_or_many_targets_are_rejected() {
        assert!(attachment_target(&target(None, None, None)).is_err());
        assert!(attachment_target(&target(Some("alice"), Some("ops"), None)).is_err());
    }
}
