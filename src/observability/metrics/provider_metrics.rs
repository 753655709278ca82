//! # Provider Metrics
//!
//! Remote operations issued through capability clients.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::IntCounterVec;
use std::sync::LazyLock;

static REMOTE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "minio_controller_remote_operations_total",
            "Total number of remote operations by capability, operation and result",
        ),
        &["capability", "operation", "result"],
    )
    .expect("Failed to create REMOTE_OPERATIONS_TOTAL metric - this should never happen")
});

/// Register provider metrics with the registry
pub(crate) fn register_provider_metrics() -> Result<()> {
    REGISTRY.register(Box::new(REMOTE_OPERATIONS_TOTAL.clone()))?;
    Ok(())
}

/// `result` is `success` or the error class
pub fn increment_remote_operations(capability: &str, operation: &str, result: &str) {
    REMOTE_OPERATIONS_TOTAL
        .with_label_values(&[capability, operation, result])
        .inc();
}
