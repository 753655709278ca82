//! # Resource Kinds
//!
//! [`ManagedResource`](super::lifecycle::ManagedResource) implementations, one per
//! custom resource. Each supplies its connection, desired state and status
//! projection; the lifecycle itself is shared.

mod alias;
mod bucket;
mod endpoint;
mod lifecycle_policy;
mod policy;
mod policy_attachment;
mod server;
mod user;

pub use alias::ALIAS_FINALIZER;
pub use bucket::BUCKET_FINALIZER;
pub use endpoint::ENDPOINT_FINALIZER;
pub use lifecycle_policy::LIFECYCLE_POLICY_FINALIZER;
pub use policy::POLICY_FINALIZER;
pub use policy_attachment::{attachment_target, POLICY_ATTACHMENT_FINALIZER};
pub use user::USER_FINALIZER;

use super::types::ReconcilerError;
use crate::controller::connection::ConnectionReference;
use crate::crd::ConnectionSpec;
use sha2::{Digest, Sha256};

fn invalid(error: anyhow::Error) -> ReconcilerError {
    ReconcilerError::Configuration(format!("{error:#}"))
}

fn dependent_connection(spec: &ConnectionSpec) -> Result<ConnectionReference, ReconcilerError> {
    Ok(ConnectionReference::try_from(spec)?)
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Reject renaming a remote object once it has been created under another name
/// The name recorded by the last successful pass, else the spec value
fn recorded_or_current(recorded: Option<&str>, current: &str) -> String {
    recorded.unwrap_or(current).to_string()
}

fn ensure_unchanged(
    field: &str,
    recorded: Option<&str>,
    current: &str,
) -> Result<(), ReconcilerError> {
    match recorded {
        Some(previous) if previous != current => Err(ReconcilerError::Configuration(format!(
            "{field} cannot change from {previous:?} to {current:?}; create a new resource instead"
        ))),
        _ => Ok(()),
    }
}
