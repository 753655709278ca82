//! # Connection Resolution
//!
//! Turns a resource's connection block into a live, authenticated client
//! configuration.
//!
//! - `reference` - validated [`ConnectionReference`] built from the raw CRD block
//! - `lookup` - read access to Alias, Endpoint and Secret objects
//! - `resolver` - [`ConnectionResolver`] and the resolved configuration

mod lookup;
mod reference;
mod resolver;

pub use lookup::{ClusterLookup, InMemoryLookup, KubeLookup};
pub use reference::{ConnectionReference, DirectConnection};
pub use resolver::{read_secret_key, ConnectionResolver, ResolvedConnectionConfig};

use thiserror::Error;

/// Why a connection could not be resolved
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The connection block is malformed (zero or several sources, forbidden overrides)
    #[error("{0}")]
    Configuration(String),
    /// The referenced Alias or Endpoint is missing or not Ready
    #[error("{0}")]
    NotReady(String),
    /// The credentials secret or one of its keys is missing
    #[error("{0}")]
    Secret(String),
    /// Reading a backing object from the Kubernetes API failed
    #[error("failed to read {what}: {source}")]
    Lookup {
        what: String,
        #[source]
        source: kube::Error,
    },
}
