//! # PolicyAttachment
//!
//! Attaches a canned policy to exactly one user or group.

use super::connection::ConnectionSpec;
use super::status::ResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PolicyAttachment Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.mxcd.dev/v1alpha1
/// kind: PolicyAttachment
/// metadata:
///   name: backup-agent-invoices
/// spec:
///   connection:
///     aliasRef:
///       name: primary
///   policyName: invoices-read
///   target:
///     user: backup-agent
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "PolicyAttachment",
    group = "minio.mxcd.dev",
    version = "v1alpha1",
    namespaced,
    status = "PolicyAttachmentStatus",
    shortname = "mnpa",
    printcolumn = r#"{"name":"Policy", "type":"string", "jsonPath":".spec.policyName"}, {"name":"Target", "type":"string", "jsonPath":".status.target"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAttachmentSpec {
    pub connection: ConnectionSpec,
    pub policy_name: String,
    pub target: AttachmentTargetSpec,
}

/// Exactly one of `user`, `group` or `serviceAccount`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentTargetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Not supported by the server's policy API; rejected during validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAttachmentStatus {
    #[serde(flatten)]
    pub common: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
    /// `user:<name>` or `group:<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_at: Option<String>,
}
