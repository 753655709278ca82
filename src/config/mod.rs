//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables (populated from ConfigMap).
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Configuration is read once at startup and shared read-only with every reconcile pass.

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ProbeServerConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ProbeServerConfig) {
    (ControllerConfig::from_env(), ProbeServerConfig::from_env())
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
