//! # Controller
//!
//! - `connection` - resolving connection blocks into authenticated client settings
//! - `reconciler` - the reconcile engine and resource kinds
//! - `server` - HTTP server for metrics and probes

pub mod connection;
pub mod reconciler;
pub mod server;
