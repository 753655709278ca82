//! # Alias
//!
//! A named connection to an object-storage server that other resources reference
//! through `connection.aliasRef`.

use super::connection::{SecretReference, TlsConfig};
use super::status::ResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alias Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.mxcd.dev/v1alpha1
/// kind: Alias
/// metadata:
///   name: primary
///   namespace: storage
/// spec:
///   url: https://minio.storage.svc:9000
///   secretRef:
///     name: minio-root
///   healthCheck:
///     intervalSeconds: 120
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Alias",
    group = "minio.mxcd.dev",
    version = "v1alpha1",
    namespaced,
    status = "ServerConnectionStatus",
    shortname = "mnalias",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".spec.url"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}, {"name":"Version", "type":"string", "jsonPath":".status.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AliasSpec {
    /// Server URL (http or https)
    pub url: String,
    /// Credentials used for every operation through this alias
    pub secret_ref: SecretReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Use path-style bucket addressing
    #[serde(default)]
    pub path_style: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Periodic health check settings for an Alias or Endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Probe the server on every pass (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between passes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    /// Seconds before a probe is considered failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// Status shared by Alias and Endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerConnectionStatus {
    #[serde(flatten)]
    pub common: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<String>,
    /// Server version reported by the admin API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// First time the server was reached successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
}
