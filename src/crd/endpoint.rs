//! # Endpoint
//!
//! Deprecated predecessor of [`Alias`](super::Alias). Still reconciled so that
//! existing `connection.endpointRef` users keep working.

use super::alias::{HealthCheckConfig, ServerConnectionStatus};
use super::connection::{SecretReference, TlsConfig};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Endpoint",
    group = "minio.mxcd.dev",
    version = "v1alpha1",
    namespaced,
    status = "ServerConnectionStatus",
    shortname = "mnendpoint",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".spec.url"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    pub url: String,
    pub secret_ref: SecretReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}
