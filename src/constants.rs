//! # Constants
//!
//! Default values for controller configuration, remote defaults and CRD identity.

/// API group shared by every custom resource the controller owns
pub const API_GROUP: &str = "minio.mxcd.dev";

/// Field manager used for writes to the Kubernetes API
pub const FIELD_MANAGER: &str = "minio-resource-controller";

/// Default HTTP server port for metrics and probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default server startup timeout in seconds
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval in milliseconds
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue delay after a failed pass (seconds)
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 60;

/// Default requeue delay after an optimistic-concurrency conflict (milliseconds)
pub const DEFAULT_CONFLICT_REQUEUE_MS: u64 = 500;

/// Default drift-detection interval for storage resources (seconds)
pub const DEFAULT_STEADY_STATE_REQUEUE_SECS: u64 = 3600;

/// Default health check interval for Alias and Endpoint resources (seconds)
pub const DEFAULT_ALIAS_HEALTH_INTERVAL_SECS: u64 = 300;

/// Default timeout applied to every remote call (seconds)
pub const DEFAULT_REMOTE_CALL_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent reconciles per resource kind
pub const DEFAULT_CONTROLLER_CONCURRENCY: u16 = 4;

/// Delay before restarting a failed watch stream (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Region used when neither the connection nor the resource names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default secret key holding the access key id
pub const DEFAULT_ACCESS_KEY_ID_KEY: &str = "accessKeyID";

/// Default secret key holding the secret access key
pub const DEFAULT_SECRET_ACCESS_KEY_KEY: &str = "secretAccessKey";

/// Default secret key holding a user's password
pub const DEFAULT_PASSWORD_KEY: &str = "password";
