//! # Status Projection
//!
//! Maps pass transitions onto the common status block. Conditions are only ever
//! flipped, never removed.

use super::types::ReconcilerError;
use crate::crd::{format_timestamp, ConditionStatus, ConditionType, ResourceStatus};
use chrono::{DateTime, Utc};

const REASON_RECONCILING: &str = "Reconciling";
const REASON_RECONCILED: &str = "Reconciled";
const REASON_PARTIAL: &str = "PartialFailure";
const REASON_DELETING: &str = "Deleting";

/// Entering Progressing: record intent before any remote work
pub fn mark_progressing(status: &mut ResourceStatus, generation: Option<i64>, now: DateTime<Utc>) {
    status.set_condition(
        ConditionType::Progressing,
        ConditionStatus::True,
        REASON_RECONCILING,
        "Reconciling desired state",
        now,
    );
    status.observed_generation = generation;
}

/// Pass converged; `warnings` are non-fatal problems reported by the server
pub fn mark_ready(status: &mut ResourceStatus, message: &str, warnings: &[String], now: DateTime<Utc>) {
    status.set_condition(
        ConditionType::Ready,
        ConditionStatus::True,
        REASON_RECONCILED,
        message,
        now,
    );
    status.set_condition(
        ConditionType::Progressing,
        ConditionStatus::False,
        REASON_RECONCILED,
        "Reconciliation complete",
        now,
    );
    if status.condition(ConditionType::Error).is_some() {
        status.set_condition(
            ConditionType::Error,
            ConditionStatus::False,
            REASON_RECONCILED,
            "",
            now,
        );
    }

    if !warnings.is_empty() {
        status.set_condition(
            ConditionType::Degraded,
            ConditionStatus::True,
            REASON_PARTIAL,
            &warnings.join("; "),
            now,
        );
    } else if status.condition(ConditionType::Degraded).is_some() {
        status.set_condition(
            ConditionType::Degraded,
            ConditionStatus::False,
            REASON_RECONCILED,
            "",
            now,
        );
    }

    status.ready = true;
    status.last_sync_time = Some(format_timestamp(now));
}

/// Pass failed; Progressing is left as it was
pub fn mark_failed(status: &mut ResourceStatus, error: &ReconcilerError, now: DateTime<Utc>) {
    let message = error.to_string();
    status.set_condition(
        ConditionType::Error,
        ConditionStatus::True,
        error.reason(),
        &message,
        now,
    );
    status.set_condition(
        ConditionType::Ready,
        ConditionStatus::False,
        error.reason(),
        &message,
        now,
    );
    status.ready = false;
    status.last_sync_time = Some(format_timestamp(now));
}

/// Remote cleanup failed while the resource is being deleted
pub fn mark_cleanup_failed(status: &mut ResourceStatus, error: &ReconcilerError, now: DateTime<Utc>) {
    let message = format!("cleanup failed, will retry: {error}");
    status.set_condition(
        ConditionType::Error,
        ConditionStatus::True,
        error.reason(),
        &message,
        now,
    );
    status.set_condition(
        ConditionType::Ready,
        ConditionStatus::False,
        REASON_DELETING,
        &message,
        now,
    );
    status.ready = false;
    status.last_sync_time = Some(format_timestamp(now));
}
