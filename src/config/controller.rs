//! # Reconciliation Configuration
//!
//! Requeue intervals, remote call bounds and watch scope.

use super::env_var_or_default;
use crate::constants::{
    DEFAULT_ALIAS_HEALTH_INTERVAL_SECS, DEFAULT_CONFLICT_REQUEUE_MS, DEFAULT_CONTROLLER_CONCURRENCY,
    DEFAULT_ERROR_REQUEUE_SECS, DEFAULT_REMOTE_CALL_TIMEOUT_SECS,
    DEFAULT_STEADY_STATE_REQUEUE_SECS,
};
use std::time::Duration;

/// Controller configuration
///
/// Built once at startup and handed to every reconcile pass through the shared context.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue delay after any failed pass, including failed cleanup
    pub error_requeue: Duration,
    /// Requeue delay after a status-write conflict or a freshly attached finalizer
    pub conflict_requeue: Duration,
    /// Drift-detection interval for buckets, users, policies and lifecycle rules
    pub steady_state_requeue: Duration,
    /// Health check interval for Alias/Endpoint resources without an explicit interval
    pub alias_health_interval: Duration,
    /// Upper bound on every call made to the object-storage server
    pub remote_call_timeout: Duration,
    /// Maximum concurrent reconciles per resource kind
    pub concurrency: u16,
    /// Restrict watches to a single namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
            conflict_requeue: Duration::from_millis(DEFAULT_CONFLICT_REQUEUE_MS),
            steady_state_requeue: Duration::from_secs(DEFAULT_STEADY_STATE_REQUEUE_SECS),
            alias_health_interval: Duration::from_secs(DEFAULT_ALIAS_HEALTH_INTERVAL_SECS),
            remote_call_timeout: Duration::from_secs(DEFAULT_REMOTE_CALL_TIMEOUT_SECS),
            concurrency: DEFAULT_CONTROLLER_CONCURRENCY,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            error_requeue: Duration::from_secs(env_var_or_default(
                "ERROR_REQUEUE_SECS",
                DEFAULT_ERROR_REQUEUE_SECS,
            )),
            conflict_requeue: Duration::from_millis(env_var_or_default(
                "CONFLICT_REQUEUE_MS",
                DEFAULT_CONFLICT_REQUEUE_MS,
            )),
            steady_state_requeue: Duration::from_secs(env_var_or_default(
                "STEADY_STATE_REQUEUE_SECS",
                DEFAULT_STEADY_STATE_REQUEUE_SECS,
            )),
            alias_health_interval: Duration::from_secs(env_var_or_default(
                "ALIAS_HEALTH_INTERVAL_SECS",
                DEFAULT_ALIAS_HEALTH_INTERVAL_SECS,
            )),
            remote_call_timeout: Duration::from_secs(env_var_or_default(
                "REMOTE_CALL_TIMEOUT_SECS",
                DEFAULT_REMOTE_CALL_TIMEOUT_SECS,
            )),
            concurrency: env_var_or_default("CONTROLLER_CONCURRENCY", DEFAULT_CONTROLLER_CONCURRENCY),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.error_requeue, Duration::from_secs(60));
        assert_eq!(config.conflict_requeue, Duration::from_millis(500));
        assert_eq!(config.steady_state_requeue, Duration::from_secs(3600));
        assert_eq!(config.alias_health_interval, Duration::from_secs(300));
        assert!(config.conflict_requeue < Duration::from_secs(1));
        assert!(config.watch_namespace.is_none());
    }

    #[test]
    fn test_unparseable_env_value_falls_back_to_default() {
        std::env::set_var("MINIO_CONTROLLER_TEST_UNPARSEABLE", "not-a-number");
        let value: u64 = env_var_or_default("MINIO_CONTROLLER_TEST_UNPARSEABLE", 42);
        assert_eq!(value, 42);
        std::env::remove_var("MINIO_CONTROLLER_TEST_UNPARSEABLE");
    }
}
