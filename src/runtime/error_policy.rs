//! # Error Policy
//!
//! Requeue decisions for failed reconciles and classification of controller
//! stream errors.

use crate::controller::reconciler::{Context, ManagedResource, ReconcilerError};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Requeue a failed reconcile after the configured error delay
///
/// Only errors that escaped the pass land here; failures the pass could record on
/// the status were already turned into a scheduled requeue.
pub fn error_policy<K, S>(obj: Arc<K>, error: &ReconcilerError, ctx: Arc<Context<S>>) -> Action
where
    K: ManagedResource,
{
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    error!(
        resource.kind = K::KIND,
        resource.name = %name,
        resource.namespace = %namespace,
        reason = error.reason(),
        "Reconciliation error: {error}"
    );

    let delay = ctx.config.error_requeue;
    debug!("Retrying {}/{namespace}/{name} in {}s", K::KIND, delay.as_secs());
    metrics::increment_requeues_total("error");
    Action::requeue(delay)
}

/// Log an error surfaced by a controller stream
///
/// The controller restarts its watches with backoff on its own; this only decides
/// how loudly to report.
pub fn handle_controller_error(
    kind: &str,
    error: &controller::Error<ReconcilerError, watcher::Error>,
) {
    match error {
        controller::Error::ReconcilerFailed(e, obj) => {
            debug!(resource.kind = kind, object = %obj, error = %e, "reconcile failed, requeued by error policy");
        }
        controller::Error::ObjectNotFound(obj) => {
            debug!(resource.kind = kind, object = %obj, "object deleted before reconcile");
        }
        controller::Error::QueueError(e) => {
            let text = e.to_string();
            if text.contains("410") || text.contains("too old resource version") {
                warn!(resource.kind = kind, "Watch resource version expired, watch will restart");
            } else if text.contains("401") || text.contains("403") || text.contains("Forbidden") {
                error!(
                    resource.kind = kind,
                    "Watch rejected ({text}); check the controller's RBAC for {kind} resources"
                );
            } else if text.contains("404") {
                error!(
                    resource.kind = kind,
                    "Watch failed ({text}); is the {kind} CRD installed?"
                );
            } else {
                warn!(resource.kind = kind, "Watch error: {text}");
            }
        }
        other => {
            error!(resource.kind = kind, "Controller stream error: {other}");
        }
    }
}
