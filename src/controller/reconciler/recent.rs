//! # Recent Writes
//!
//! Every status or finalizer write produces a watch event for the same object.
//! Those events carry a resourceVersion this controller wrote itself, so they are
//! answered with the time left until the scheduled pass instead of a new pass.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry {
    versions: Vec<String>,
    due: Instant,
}

/// resourceVersions written by the last pass of each object
#[derive(Debug, Default)]
pub struct RecentWrites {
    entries: Mutex<HashMap<String, Entry>>,
}

impl RecentWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the versions written by a pass and when the next pass is due
    pub fn record(&self, key: &str, versions: Vec<String>, requeue_after: Option<Duration>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match requeue_after {
            Some(delay) if !versions.is_empty() => {
                entries.insert(
                    key.to_owned(),
                    Entry {
                        versions,
                        due: Instant::now() + delay,
                    },
                );
            }
            _ => {
                entries.remove(key);
            }
        }
    }

    /// Time left before the scheduled pass, if `resource_version` is one of ours
    pub fn pending(&self, key: &str, resource_version: Option<&str>) -> Option<Duration> {
        let version = resource_version?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if !entry.versions.iter().any(|v| v == version) {
            return None;
        }
        let now = Instant::now();
        (entry.due > now).then(|| entry.due - now)
    }
}
