//! Desired-state and observation types exchanged with capability clients.

use crate::crd::{LifecycleRule, UserAccountStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Result of a successful upsert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// The object did not exist before this call
    pub created: bool,
    /// Non-fatal problems; the resource is reported Degraded while any remain
    pub warnings: Vec<String>,
}

impl UpsertReport {
    pub fn created() -> Self {
        Self {
            created: true,
            warnings: Vec::new(),
        }
    }

    pub fn updated() -> Self {
        Self::default()
    }
}

/// What the server reports about an object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub name: String,
    pub region: Option<String>,
    /// Server version (server probes only)
    pub version: Option<String>,
    pub created_at: Option<String>,
}

/// Health probe settings for Alias and Endpoint resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerProbe {
    pub enabled: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketDesired {
    pub region: Option<String>,
    pub object_locking: bool,
    pub versioning: Option<bool>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UserDesired {
    pub secret_key: String,
    #[zeroize(skip)]
    pub status: UserAccountStatus,
    #[zeroize(skip)]
    pub groups: Vec<String>,
    #[zeroize(skip)]
    pub policies: Vec<String>,
}

impl fmt::Debug for UserDesired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDesired")
            .field("secret_key", &"<redacted>")
            .field("status", &self.status)
            .field("groups", &self.groups)
            .field("policies", &self.policies)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDesired {
    /// Compact JSON document
    pub document: String,
    /// sha256 hex of `document`
    pub hash: String,
}

/// Principal a policy is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentTarget {
    User(String),
    Group(String),
}

impl AttachmentTarget {
    /// Stable `user:<name>` / `group:<name>` form used as the remote name
    pub fn key(&self) -> String {
        match self {
            Self::User(name) => format!("user:{name}"),
            Self::Group(name) => format!("group:{name}"),
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        match key.split_once(':') {
            Some(("user", name)) if !name.is_empty() => Some(Self::User(name.to_owned())),
            Some(("group", name)) if !name.is_empty() => Some(Self::Group(name.to_owned())),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::User(name) | Self::Group(name) => name,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDesired {
    pub policy_name: String,
    pub target: AttachmentTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleDesired {
    pub rules: Vec<LifecycleRule>,
    /// sha256 hex of the canonical JSON rule set
    pub hash: String,
}
