//! Reconcile integration tests
//!
//! - Finalizer, deletion and requeue behaviour shared by every kind
//! - Connection resolution through Alias, Endpoint and direct URLs
//! - Kind-specific behaviour (policies, attachments, lifecycle rules, users)

pub mod connection;
pub mod harness;
pub mod kinds;
pub mod lifecycle;
