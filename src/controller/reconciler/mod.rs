//! # Reconciler
//!
//! The generic reconcile engine and the per-kind plumbing around it.
//!
//! - `lifecycle` - the shared pass: finalizers, progressing, converge, ready/error
//! - `kinds` - [`ManagedResource`] implementations for each custom resource
//! - `status` - condition and status projection
//! - `requeue` - outcome to requeue mapping
//! - `store` - finalizer and status writes (Kubernetes API or in-memory)
//! - `recent` - recognizes watch events caused by our own writes
//! - `validation` - spec validation helpers

pub mod kinds;
mod lifecycle;
mod recent;
mod requeue;
pub mod status;
mod store;
mod types;
pub mod validation;

pub use lifecycle::{reconcile, reconcile_resource, Convergence, ManagedResource, PassReport};
pub use recent::RecentWrites;
pub use requeue::{FixedIntervalScheduler, Outcome, RequeueScheduler};
pub use store::{InMemoryStore, KubeStore, ResourceStore, StoreError, StoreWrite, StoredResource};
pub use types::{Context, ReconcilerError};
