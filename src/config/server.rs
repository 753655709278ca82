//! # Probe Server Configuration
//!
//! Where the metrics/health listener binds and how long startup waits for it.

use super::env_var_or_default;
use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Metrics and probe listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Startup fails when the listener is not bound within this window
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ProbeServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_METRICS_PORT,
            startup_timeout: Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS),
        }
    }
}

impl ProbeServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_var_or_default("PROBE_BIND_ADDRESS", defaults.bind_address),
            port: env_var_or_default("METRICS_PORT", defaults.port),
            startup_timeout: Duration::from_secs(env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            )),
            // A zero interval would spin the startup wait
            poll_interval: Duration::from_millis(
                env_var_or_default("SERVER_POLL_INTERVAL_MS", DEFAULT_SERVER_POLL_INTERVAL_MS)
                    .max(1),
            ),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
