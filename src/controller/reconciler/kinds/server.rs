//! Shared behaviour of the server-describing kinds (Alias and Endpoint).

use super::super::lifecycle::Convergence;
use super::super::types::ReconcilerError;
use super::super::validation::validate_server_url;
use super::invalid;
use crate::config::ControllerConfig;
use crate::controller::connection::{ConnectionReference, DirectConnection};
use crate::crd::{
    format_timestamp, HealthCheckConfig, SecretReference, ServerConnectionStatus, TlsConfig,
};
use crate::provider::{CapabilityClient, ServerProbe};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub(super) struct ServerSpec<'a> {
    pub url: &'a str,
    pub secret_ref: &'a SecretReference,
    pub tls: Option<&'a TlsConfig>,
    pub region: Option<&'a String>,
    pub path_style: bool,
    pub health_check: Option<&'a HealthCheckConfig>,
}

impl ServerSpec<'_> {
    /// The server describes itself as a direct connection
    pub fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        validate_server_url(self.url, "url").map_err(invalid)?;
        Ok(ConnectionReference::Direct(DirectConnection {
            url: self.url.to_owned(),
            secret_ref: self.secret_ref.clone(),
            insecure_tls: self.tls.is_some_and(|tls| tls.insecure),
            region: self.region.cloned(),
            path_style: self.path_style,
        }))
    }

    pub fn probe(&self) -> ServerProbe {
        ServerProbe {
            enabled: self.health_check.is_none_or(|hc| hc.enabled),
            timeout: self
                .health_check
                .and_then(|hc| hc.timeout_seconds)
                .map(Duration::from_secs),
        }
    }

    pub fn interval(&self, config: &ControllerConfig) -> Duration {
        self.health_check
            .and_then(|hc| hc.interval_seconds)
            .map(Duration::from_secs)
            .unwrap_or(config.alias_health_interval)
    }
}

/// Health check, then read the server version; a missing version only degrades
pub(super) async fn probe_server(
    client: &dyn CapabilityClient<ServerProbe>,
    probe: &ServerProbe,
    name: &str,
) -> Result<Convergence, ReconcilerError> {
    if probe.enabled {
        match probe.timeout {
            Some(limit) => tokio::time::timeout(limit, client.health_check())
                .await
                .map_err(|_elapsed| {
                    ReconcilerError::Connectivity(format!(
                        "health check did not answer within {}s",
                        limit.as_secs()
                    ))
                })??,
            None => client.health_check().await?,
        }
    } else {
        debug!("health check disabled");
    }

    let mut warnings = Vec::new();
    let remote = match client.describe(name).await {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warnings.push(format!("server info unavailable: {e}"));
            None
        }
    };
    Ok(Convergence {
        created: false,
        remote,
        warnings,
    })
}

pub(super) fn project_server(
    status: &mut ServerConnectionStatus,
    url: &str,
    spec_region: Option<&String>,
    convergence: &Convergence,
    now: DateTime<Utc>,
) {
    let timestamp = format_timestamp(now);
    status.url = Some(url.to_owned());
    status.healthy = Some(true);
    status.last_health_check = Some(timestamp.clone());
    if let Some(remote) = &convergence.remote {
        status.version = remote.version.clone();
    }
    status.region = convergence
        .remote
        .as_ref()
        .and_then(|r| r.region.clone())
        .or_else(|| spec_region.cloned());
    if status.connected_at.is_none() {
        status.connected_at = Some(timestamp);
    }
}

pub(super) fn project_unhealthy(status: &mut ServerConnectionStatus, now: DateTime<Utc>) {
    status.healthy = Some(false);
    status.last_health_check = Some(format_timestamp(now));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RemoteMetadata;
    use chrono::TimeZone;

    fn secret() -> SecretReference {
        SecretReference {
            name: "root".to_string(),
            namespace: None,
            access_key_id_key: None,
            secret_access_key_key: None,
        }
    }

    #[test]
    fn test_probe_defaults_to_enabled_without_timeout() {
        let secret = secret();
        let spec = ServerSpec {
            url: "http://minio:9000",
            secret_ref: &secret,
            tls: None,
            region: None,
            path_style: false,
            health_check: None,
        };
        assert_eq!(
            spec.probe(),
            ServerProbe {
                enabled: true,
                timeout: None
            }
        );
        assert_eq!(
            spec.interval(&ControllerConfig::default()),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let secret = secret();
        let spec = ServerSpec {
            url: "ftp://minio",
            secret_ref: &secret,
            tls: None,
            region: None,
            path_style: false,
            health_check: None,
        };
        assert_eq!(spec.connection().unwrap_err().reason(), "ConfigurationError");
    }

    #[test]
    fn test_connected_at_is_kept_across_passes() {
        let mut status = ServerConnectionStatus::default();
        let convergence = Convergence {
            remote: Some(RemoteMetadata {
                version: Some("RELEASE.2024-01-01".to_string()),
                ..RemoteMetadata::default()
            }),
            ..Convergence::default()
        };
        let first = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let later = Utc.timestamp_opt(1_700_000_600, 0).unwrap();

        project_server(&mut status, "http://minio:9000", None, &convergence, first);
        project_server(&mut status, "http://minio:9000", None, &convergence, later);

        assert_eq!(status.connected_at, Some(format_timestamp(first)));
        assert_eq!(status.last_health_check, Some(format_timestamp(later)));
        assert_eq!(status.version.as_deref(), Some("RELEASE.2024-01-01"));
        assert_eq!(status.healthy, Some(true));
    }
}
