//! # Connection Block
//!
//! The raw `connection` block embedded in every dependent resource, as users write it.
//! It is validated into a [`ConnectionReference`](crate::controller::connection::ConnectionReference)
//! before any reconcile logic looks at it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a resource reaches its object-storage server
///
/// Exactly one of `aliasRef`, `url` or `endpointRef` must be set.
///
/// # Example
///
/// ```yaml
/// connection:
///   aliasRef:
///     name: primary
/// ```
///
/// ```yaml
/// connection:
///   url: http://minio.storage.svc:9000
///   secretRef:
///     name: minio-root
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    /// Reference to an Alias resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_ref: Option<NamespacedRef>,
    /// Reference to an Endpoint resource (deprecated, use `aliasRef`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_ref: Option<NamespacedRef>,
    /// Direct server URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Credentials for `url`, or an override of the Endpoint's own credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
    /// TLS settings for `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Region for `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Path-style addressing for `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_style: Option<bool>,
}

/// Reference to a namespaced object; namespace defaults to the referencing resource's
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Reference to a Secret holding an access key pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    pub name: String,
    /// Secret namespace; defaults to the namespace of the object holding the reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Key holding the access key id (default: `accessKeyID`)
    #[serde(
        default,
        rename = "accessKeyIDKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_key_id_key: Option<String>,
    /// Key holding the secret access key (default: `secretAccessKey`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Skip certificate verification
    #[serde(default)]
    pub insecure: bool,
}
