//! # Runtime Module
//!
//! Startup, the per-kind watch loop and error handling for the controller binary.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use error_policy::*;
pub use initialization::*;
pub use watch_loop::*;
