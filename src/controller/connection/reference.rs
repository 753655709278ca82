//! Validated connection references.

use super::ResolutionError;
use crate::controller::reconciler::validation::validate_server_url;
use crate::crd::{ConnectionSpec, NamespacedRef, SecretReference};

/// Exactly one way of reaching a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionReference {
    /// Use a Ready Alias and its credentials
    Alias(NamespacedRef),
    /// Connect to a URL with explicit credentials
    Direct(DirectConnection),
    /// Use a Ready Endpoint (deprecated); `secret_ref` overrides the Endpoint's credentials
    Endpoint {
        reference: NamespacedRef,
        secret_ref: Option<SecretReference>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectConnection {
    pub url: String,
    pub secret_ref: SecretReference,
    pub insecure_tls: bool,
    pub region: Option<String>,
    pub path_style: bool,
}

impl ConnectionReference {
    /// Source name as written in the connection block
    pub fn source(&self) -> &'static str {
        match self {
            Self::Alias(_) => "aliasRef",
            Self::Direct(_) => "url",
            Self::Endpoint { .. } => "endpointRef",
        }
    }
}

impl TryFrom<&ConnectionSpec> for ConnectionReference {
    type Error = ResolutionError;

    fn try_from(spec: &ConnectionSpec) -> Result<Self, Self::Error> {
        // Checked in precedence order so messages list sources consistently
        let mut sources = Vec::new();
        if spec.alias_ref.is_some() {
            sources.push("aliasRef");
        }
        if spec.url.is_some() {
            sources.push("url");
        }
        if spec.endpoint_ref.is_some() {
            sources.push("endpointRef");
        }

        match sources.len() {
            0 => {
                return Err(ResolutionError::Configuration(
                    "connection must set exactly one of aliasRef, url or endpointRef; none is set"
                        .to_string(),
                ))
            }
            1 => {}
            _ => {
                return Err(ResolutionError::Configuration(format!(
                    "connection must set exactly one of aliasRef, url or endpointRef; found {}",
                    sources.join(", ")
                )))
            }
        }

        let mut overrides = Vec::new();
        if spec.tls.is_some() {
            overrides.push("tls");
        }
        if spec.region.is_some() {
            overrides.push("region");
        }
        if spec.path_style.is_some() {
            overrides.push("pathStyle");
        }

        if let Some(alias) = &spec.alias_ref {
            if spec.secret_ref.is_some() {
                overrides.insert(0, "secretRef");
            }
            if !overrides.is_empty() {
                return Err(ResolutionError::Configuration(format!(
                    "aliasRef cannot be combined with {}; configure them on the Alias",
                    overrides.join(", ")
                )));
            }
            return Ok(Self::Alias(alias.clone()));
        }

        if let Some(url) = &spec.url {
            validate_server_url(url, "connection.url")
                .map_err(|e| ResolutionError::Configuration(e.to_string()))?;
            let secret_ref = spec.secret_ref.clone().ok_or_else(|| {
                ResolutionError::Configuration("connection.url requires secretRef".to_string())
            })?;
            return Ok(Self::Direct(DirectConnection {
                url: url.clone(),
                secret_ref,
                insecure_tls: spec.tls.as_ref().is_some_and(|tls| tls.insecure),
                region: spec.region.clone(),
                path_style: spec.path_style.unwrap_or(false),
            }));
        }

        let Some(endpoint) = &spec.endpoint_ref else {
            return Err(ResolutionError::Configuration(
                "connection has no source".to_string(),
            ));
        };
        if !overrides.is_empty() {
            return Err(ResolutionError::Configuration(format!(
                "endpointRef cannot be combined with {}; configure them on the Endpoint",
                overrides.join(", ")
            )));
        }
        Ok(Self::Endpoint {
            reference: endpoint.clone(),
            secret_ref: spec.secret_ref.clone(),
        })
    }
}
