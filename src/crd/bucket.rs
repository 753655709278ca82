//! # Bucket
//!
//! A bucket on the object-storage server. Deleting the resource empties and removes
//! the bucket.

use super::connection::ConnectionSpec;
use super::status::ResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.mxcd.dev/v1alpha1
/// kind: Bucket
/// metadata:
///   name: invoices
/// spec:
///   connection:
///     aliasRef:
///       name: primary
///   bucketName: invoices
///   versioning: true
///   tags:
///     team: billing
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Bucket",
    group = "minio.mxcd.dev",
    version = "v1alpha1",
    namespaced,
    status = "BucketStatus",
    shortname = "mnbucket",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.bucketName"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    pub connection: ConnectionSpec,
    /// Name of the bucket on the server
    pub bucket_name: String,
    /// Region to create the bucket in (defaults to the connection's region)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Enable object locking; only honoured at creation time
    #[serde(default)]
    pub object_locking: bool,
    /// `true` enables versioning, `false` suspends it, unset leaves it untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketStatus {
    #[serde(flatten)]
    pub common: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}
