//! # Requeue Scheduling
//!
//! Maps the outcome of a pass to the next wake-up time. Retries use fixed
//! intervals with no growth and no jitter.

use crate::config::ControllerConfig;
use std::fmt;
use std::time::Duration;

/// How a reconcile pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Finalizer persisted; the pass stopped there
    FinalizerAttached,
    /// Converged; `degraded` when non-fatal warnings were reported
    Ready {
        steady_interval: Duration,
        degraded: bool,
    },
    /// Resolution or convergence failed; recorded on the Error condition
    Failed { reason: &'static str, message: String },
    /// A write raced with another writer
    Conflict,
    /// Remote cleanup failed; the finalizer stays in place
    CleanupFailed { reason: &'static str, message: String },
    /// Cleanup done and finalizer removed
    Removed,
    /// Nothing left to do for this object
    Gone,
}

impl Outcome {
    /// Label used for requeue metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::FinalizerAttached => "finalizer-attached",
            Self::Ready { .. } => "steady-state",
            Self::Failed { .. } => "error",
            Self::Conflict => "conflict",
            Self::CleanupFailed { .. } => "cleanup-retry",
            Self::Removed => "removed",
            Self::Gone => "gone",
        }
    }
}

/// Decides when a resource is reconciled next; `None` waits for the next change
pub trait RequeueScheduler: Send + Sync + fmt::Debug {
    fn schedule(&self, outcome: &Outcome) -> Option<Duration>;
}

/// Fixed retry intervals for errors and conflicts, per-kind interval when Ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedIntervalScheduler {
    pub error_delay: Duration,
    pub conflict_delay: Duration,
}

impl FixedIntervalScheduler {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            error_delay: config.error_requeue,
            conflict_delay: config.conflict_requeue,
        }
    }
}

impl RequeueScheduler for FixedIntervalScheduler {
    fn schedule(&self, outcome: &Outcome) -> Option<Duration> {
        match outcome {
            Outcome::FinalizerAttached | Outcome::Conflict => Some(self.conflict_delay),
            Outcome::Ready {
                steady_interval, ..
            } => Some(*steady_interval),
            Outcome::Failed { .. } | Outcome::CleanupFailed { .. } => Some(self.error_delay),
            Outcome::Removed | Outcome::Gone => None,
        }
    }
}
