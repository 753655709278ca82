//! # Policy
//!
//! A canned IAM policy document stored on the server.

use super::connection::ConnectionSpec;
use super::status::ResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Policy Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.mxcd.dev/v1alpha1
/// kind: Policy
/// metadata:
///   name: invoices-read
/// spec:
///   connection:
///     aliasRef:
///       name: primary
///   policyName: invoices-read
///   policy: |
///     {"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["s3:GetObject"],"Resource":["arn:aws:s3:::invoices/*"]}]}
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Policy",
    group = "minio.mxcd.dev",
    version = "v1alpha1",
    namespaced,
    status = "PolicyStatus",
    shortname = "mnpolicy",
    printcolumn = r#"{"name":"Policy", "type":"string", "jsonPath":".spec.policyName"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    pub connection: ConnectionSpec,
    pub policy_name: String,
    /// Policy document as JSON text
    pub policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(flatten)]
    pub common: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
    /// sha256 of the document last written to the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}
