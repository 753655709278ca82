//! # Connection Resolver
//!
//! Resolves a [`ConnectionReference`] into a [`ResolvedConnectionConfig`].
//!
//! Resolution is read-only and recomputed on every pass, so credential rotation and
//! Alias edits are picked up without restarts. Dependency readiness is checked before
//! any secret is read.

use super::lookup::ClusterLookup;
use super::reference::{ConnectionReference, DirectConnection};
use super::ResolutionError;
use crate::constants::{DEFAULT_ACCESS_KEY_ID_KEY, DEFAULT_SECRET_ACCESS_KEY_KEY};
use crate::crd::{NamespacedRef, SecretReference};
use std::fmt;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Concrete, authenticated client configuration; never persisted
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ResolvedConnectionConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub insecure_tls: bool,
    pub path_style: bool,
    pub region: Option<String>,
}

impl fmt::Debug for ResolvedConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("insecure_tls", &self.insecure_tls)
            .field("path_style", &self.path_style)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Resolves connection references through a [`ClusterLookup`]
#[derive(Debug, Clone, Copy)]
pub struct ConnectionResolver<'a> {
    lookup: &'a dyn ClusterLookup,
}

impl<'a> ConnectionResolver<'a> {
    pub fn new(lookup: &'a dyn ClusterLookup) -> Self {
        Self { lookup }
    }

    /// Resolve `reference` for a resource living in `caller_namespace`
    pub async fn resolve(
        &self,
        reference: &ConnectionReference,
        caller_namespace: &str,
    ) -> Result<ResolvedConnectionConfig, ResolutionError> {
        debug!(
            source = reference.source(),
            namespace = caller_namespace,
            "resolving connection"
        );
        match reference {
            ConnectionReference::Alias(alias_ref) => {
                self.resolve_alias(alias_ref, caller_namespace).await
            }
            ConnectionReference::Direct(direct) => {
                self.resolve_direct(direct, caller_namespace).await
            }
            ConnectionReference::Endpoint {
                reference,
                secret_ref,
            } => {
                self.resolve_endpoint(reference, secret_ref.as_ref(), caller_namespace)
                    .await
            }
        }
    }

    async fn resolve_alias(
        &self,
        alias_ref: &NamespacedRef,
        caller_namespace: &str,
    ) -> Result<ResolvedConnectionConfig, ResolutionError> {
        let namespace = alias_ref.namespace.as_deref().unwrap_or(caller_namespace);
        let name = &alias_ref.name;

        let alias = self
            .lookup
            .alias(namespace, name)
            .await
            .map_err(|source| ResolutionError::Lookup {
                what: format!("alias {namespace}/{name}"),
                source,
            })?
            .ok_or_else(|| {
                ResolutionError::NotReady(format!("alias {namespace}/{name} not found"))
            })?;

        if !alias.status.as_ref().is_some_and(|s| s.common.ready) {
            return Err(ResolutionError::NotReady(format!(
                "alias {namespace}/{name} is not ready"
            )));
        }

        let (access_key_id, secret_access_key) =
            self.read_credentials(&alias.spec.secret_ref, namespace).await?;

        Ok(ResolvedConnectionConfig {
            endpoint: alias.spec.url.clone(),
            access_key_id,
            secret_access_key,
            insecure_tls: alias.spec.tls.as_ref().is_some_and(|tls| tls.insecure),
            path_style: alias.spec.path_style,
            region: alias.spec.region.clone(),
        })
    }

    async fn resolve_direct(
        &self,
        direct: &DirectConnection,
        caller_namespace: &str,
    ) -> Result<ResolvedConnectionConfig, ResolutionError> {
        let (access_key_id, secret_access_key) = self
            .read_credentials(&direct.secret_ref, caller_namespace)
            .await?;

        Ok(ResolvedConnectionConfig {
            endpoint: direct.url.clone(),
            access_key_id,
            secret_access_key,
            insecure_tls: direct.insecure_tls,
            path_style: direct.path_style,
            region: direct.region.clone(),
        })
    }

    async fn resolve_endpoint(
        &self,
        endpoint_ref: &NamespacedRef,
        secret_override: Option<&SecretReference>,
        caller_namespace: &str,
    ) -> Result<ResolvedConnectionConfig, ResolutionError> {
        let namespace = endpoint_ref
            .namespace
            .as_deref()
            .unwrap_or(caller_namespace);
        let name = &endpoint_ref.name;
        warn!(
            endpoint = %format!("{namespace}/{name}"),
            "endpointRef is deprecated, use aliasRef"
        );

        let endpoint = self
            .lookup
            .endpoint(namespace, name)
            .await
            .map_err(|source| ResolutionError::Lookup {
                what: format!("endpoint {namespace}/{name}"),
                source,
            })?
            .ok_or_else(|| {
                ResolutionError::NotReady(format!("endpoint {namespace}/{name} not found"))
            })?;

        if !endpoint.status.as_ref().is_some_and(|s| s.common.ready) {
            return Err(ResolutionError::NotReady(format!(
                "endpoint {namespace}/{name} is not ready"
            )));
        }

        // An override secret belongs to the referencing resource, not the Endpoint
        let (access_key_id, secret_access_key) = match secret_override {
            Some(secret_ref) => self.read_credentials(secret_ref, caller_namespace).await?,
            None => {
                self.read_credentials(&endpoint.spec.secret_ref, namespace)
                    .await?
            }
        };

        Ok(ResolvedConnectionConfig {
            endpoint: endpoint.spec.url.clone(),
            access_key_id,
            secret_access_key,
            insecure_tls: endpoint.spec.tls.as_ref().is_some_and(|tls| tls.insecure),
            path_style: endpoint.spec.path_style,
            region: endpoint.spec.region.clone(),
        })
    }

    async fn read_credentials(
        &self,
        secret_ref: &SecretReference,
        default_namespace: &str,
    ) -> Result<(String, String), ResolutionError> {
        let namespace = secret_ref.namespace.as_deref().unwrap_or(default_namespace);
        let access_key_id_key = secret_ref
            .access_key_id_key
            .as_deref()
            .unwrap_or(DEFAULT_ACCESS_KEY_ID_KEY);
        let secret_access_key_key = secret_ref
            .secret_access_key_key
            .as_deref()
            .unwrap_or(DEFAULT_SECRET_ACCESS_KEY_KEY);

        let access_key_id =
            read_secret_key(self.lookup, namespace, &secret_ref.name, access_key_id_key).await?;
        let secret_access_key =
            read_secret_key(self.lookup, namespace, &secret_ref.name, secret_access_key_key)
                .await?;
        Ok((access_key_id, secret_access_key))
    }
}

/// Read one UTF-8 value from a secret
pub async fn read_secret_key(
    lookup: &dyn ClusterLookup,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, ResolutionError> {
    let data = lookup
        .secret(namespace, name)
        .await
        .map_err(|source| ResolutionError::Lookup {
            what: format!("secret {namespace}/{name}"),
            source,
        })?
        .ok_or_else(|| ResolutionError::Secret(format!("secret {namespace}/{name} not found")))?;

    let raw = data.get(key).ok_or_else(|| {
        ResolutionError::Secret(format!("secret {namespace}/{name} has no key {key}"))
    })?;

    let value = String::from_utf8(raw.clone()).map_err(|_utf8| {
        ResolutionError::Secret(format!(
            "secret {namespace}/{name} key {key} is not valid UTF-8"
        ))
    })?;

    if value.is_empty() {
        return Err(ResolutionError::Secret(format!(
            "secret {namespace}/{name} key {key} is empty"
        )));
    }
    Ok(value)
}
