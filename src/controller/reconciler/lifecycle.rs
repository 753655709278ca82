//! # Reconcile Lifecycle
//!
//! The kind-independent reconcile pass. Every managed kind plugs into the same
//! sequence through [`ManagedResource`]:
//!
//! 1. Deleting: resolve, clean up remotely, drop the finalizer
//! 2. No finalizer yet: attach it and stop
//! 3. Progressing: record `observedGeneration` before touching the server
//! 4. Resolve the connection, compute desired state, converge
//! 5. Ready or Error, then requeue
//!
//! Only Kubernetes API failures are returned as errors; everything else ends the
//! pass with an [`Outcome`] and a requeue decision.

use super::requeue::Outcome;
use super::status;
use super::store::{ResourceStore, StoredResource};
use super::types::{Context, ReconcilerError};
use crate::config::ControllerConfig;
use crate::controller::connection::{
    ClusterLookup, ConnectionReference, ConnectionResolver, ResolvedConnectionConfig,
};
use crate::crd::ResourceStatus;
use crate::observability::metrics;
use crate::provider::{
    Capability, CapabilityClient, CapabilityFactory, Instrumented, ProviderError, RemoteMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// What a convergence step observed on the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Convergence {
    /// The remote object was created during this pass
    pub created: bool,
    pub remote: Option<RemoteMetadata>,
    /// Non-fatal problems; reported through the Degraded condition
    pub warnings: Vec<String>,
}

/// A resource kind the lifecycle engine can reconcile
#[async_trait]
pub trait ManagedResource: StoredResource {
    /// Desired remote state computed from the spec
    type Desired: Send + Sync + fmt::Debug + 'static;

    /// Kind name used in logs and metrics
    const KIND: &'static str;
    const FINALIZER: &'static str;
    /// Capability label used in remote-operation metrics
    const CAPABILITY: &'static str;

    /// Which server to talk to
    fn connection(&self) -> Result<ConnectionReference, ReconcilerError>;

    /// Name of the managed object on the server
    fn remote_name(&self) -> String;

    /// Name removed on deletion. Kinds that record the applied name in status
    /// return that one, so a rejected rename never redirects the teardown.
    fn cleanup_name(&self) -> String {
        self.remote_name()
    }

    async fn desired_state(
        &self,
        lookup: &dyn ClusterLookup,
    ) -> Result<Self::Desired, ReconcilerError>;

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<Self::Desired>, ProviderError>;

    /// Bring the server in line with `desired`
    async fn converge(
        &self,
        client: &dyn CapabilityClient<Self::Desired>,
        desired: &Self::Desired,
        _config: &ControllerConfig,
    ) -> Result<Convergence, ReconcilerError> {
        let name = self.remote_name();
        let report = client.upsert(&name, desired).await?;
        let mut warnings = report.warnings;
        let remote = match client.describe(&name).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warnings.push(format!("reading back {name} failed: {e}"));
                None
            }
        };
        Ok(Convergence {
            created: report.created,
            remote,
            warnings,
        })
    }

    /// Remove the managed object from the server; absent objects are fine
    async fn cleanup(
        &self,
        client: &dyn CapabilityClient<Self::Desired>,
    ) -> Result<(), ReconcilerError> {
        client.delete(&self.cleanup_name()).await?;
        Ok(())
    }

    /// False for kinds that only describe a server and own nothing on it
    fn requires_remote_cleanup(&self) -> bool {
        true
    }

    fn status(&self) -> Option<&ResourceStatus>;

    fn status_mut(&mut self) -> &mut ResourceStatus;

    /// Write kind-specific status fields after a successful convergence
    fn project(&mut self, desired: &Self::Desired, convergence: &Convergence, now: DateTime<Utc>);

    /// Kind-specific status changes after a failed pass
    fn project_failure(&mut self, _error: &ReconcilerError, _now: DateTime<Utc>) {}

    fn steady_state_interval(&self, config: &ControllerConfig) -> Duration {
        config.steady_state_requeue
    }
}

/// Result of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub outcome: Outcome,
    pub requeue_after: Option<Duration>,
    /// resourceVersions produced by this pass's own writes
    pub written_versions: Vec<String>,
}

fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

fn object_key<K: ManagedResource>(obj: &K) -> String {
    format!(
        "{}/{}/{}",
        K::KIND,
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

/// Entry point for the controller runtime
///
/// Watch events caused by this controller's own writes are answered with the
/// remaining delay instead of a new pass.
pub async fn reconcile<K, S>(obj: Arc<K>, ctx: Arc<Context<S>>) -> Result<Action, ReconcilerError>
where
    K: ManagedResource,
    S: ResourceStore,
{
    let key = object_key(obj.as_ref());
    if let Some(remaining) = ctx
        .recent_writes
        .pending(&key, obj.meta().resource_version.as_deref())
    {
        debug!(resource = %key, ?remaining, "event from own write, keeping scheduled pass");
        return Ok(Action::requeue(remaining));
    }

    let report = reconcile_resource(obj, Arc::clone(&ctx)).await?;
    ctx.recent_writes
        .record(&key, report.written_versions.clone(), report.requeue_after);

    Ok(match report.requeue_after {
        Some(delay) => {
            metrics::increment_requeues_total(report.outcome.label());
            Action::requeue(delay)
        }
        None => Action::await_change(),
    })
}

/// Run one pass for `obj` and decide when the next one is due
pub async fn reconcile_resource<K, S>(
    obj: Arc<K>,
    ctx: Arc<Context<S>>,
) -> Result<PassReport, ReconcilerError>
where
    K: ManagedResource,
    S: ResourceStore,
{
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = info_span!(
        "reconcile",
        resource.kind = K::KIND,
        resource.name = %name,
        resource.namespace = %namespace,
        resource.generation = obj.meta().generation.unwrap_or_default(),
    );

    async move {
        let started = Instant::now();
        metrics::increment_reconciliations(K::KIND);

        let mut written = Vec::new();
        let result = run_pass(obj.as_ref(), &namespace, &ctx, &mut written).await;
        metrics::observe_reconciliation_duration(K::KIND, started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_conflict() => {
                debug!(error = %e, "write conflict, retrying shortly");
                Outcome::Conflict
            }
            Err(ReconcilerError::Gone(message)) => {
                debug!(detail = %message, "resource disappeared during the pass");
                Outcome::Gone
            }
            Err(e) => {
                metrics::increment_reconciliation_errors(K::KIND, e.reason());
                return Err(e);
            }
        };

        if let Outcome::Failed { reason, .. } | Outcome::CleanupFailed { reason, .. } = &outcome {
            metrics::increment_reconciliation_errors(K::KIND, reason);
        }

        let requeue_after = ctx.scheduler.schedule(&outcome);
        debug!(outcome = outcome.label(), ?requeue_after, "pass finished");
        Ok(PassReport {
            outcome,
            requeue_after,
            written_versions: written,
        })
    }
    .instrument(span)
    .await
}

async fn run_pass<K, S>(
    obj: &K,
    namespace: &str,
    ctx: &Context<S>,
    written: &mut Vec<String>,
) -> Result<Outcome, ReconcilerError>
where
    K: ManagedResource,
    S: ResourceStore,
{
    if obj.meta().deletion_timestamp.is_some() {
        return finalize(obj, namespace, ctx, written).await;
    }

    if !has_finalizer(obj, K::FINALIZER) {
        let updated = ctx.store.add_finalizer(obj, K::FINALIZER).await?;
        written.extend(updated.resource_version());
        metrics::increment_finalizer_operations(K::KIND, "add");
        info!(finalizer = K::FINALIZER, "finalizer attached");
        return Ok(Outcome::FinalizerAttached);
    }

    let mut current = obj.clone();
    let before = current.status().cloned();
    status::mark_progressing(current.status_mut(), obj.meta().generation, Utc::now());
    if current.status() != before.as_ref() {
        current = ctx.store.replace_status(&current).await?;
        written.extend(current.resource_version());
    } else {
        debug!("status unchanged, skipping progressing write");
    }

    match converge_remote(&current, namespace, ctx).await {
        Ok((desired, convergence)) => {
            let now = Utc::now();
            let steady_interval = current.steady_state_interval(&ctx.config);
            let degraded = !convergence.warnings.is_empty();
            let message = format!("{} {} reconciled", K::KIND, current.remote_name());
            status::mark_ready(current.status_mut(), &message, &convergence.warnings, now);
            current.project(&desired, &convergence, now);
            let saved = ctx.store.replace_status(&current).await?;
            written.extend(saved.resource_version());

            if degraded {
                warn!(warnings = ?convergence.warnings, "reconciled with warnings");
            } else {
                info!(created = convergence.created, "reconciled");
            }
            Ok(Outcome::Ready {
                steady_interval,
                degraded,
            })
        }
        Err(e) if e.is_conflict() => Err(e),
        Err(ReconcilerError::Gone(message)) => Err(ReconcilerError::Gone(message)),
        Err(e) => {
            warn!(reason = e.reason(), error = %e, "reconcile failed");
            let now = Utc::now();
            status::mark_failed(current.status_mut(), &e, now);
            current.project_failure(&e, now);
            let saved = ctx.store.replace_status(&current).await?;
            written.extend(saved.resource_version());
            Ok(Outcome::Failed {
                reason: e.reason(),
                message: e.to_string(),
            })
        }
    }
}

async fn converge_remote<K, S>(
    obj: &K,
    namespace: &str,
    ctx: &Context<S>,
) -> Result<(K::Desired, Convergence), ReconcilerError>
where
    K: ManagedResource,
    S: ResourceStore,
{
    let reference = obj.connection()?;
    let resolved = ConnectionResolver::new(ctx.lookup.as_ref())
        .resolve(&reference, namespace)
        .await?;
    let desired = obj.desired_state(ctx.lookup.as_ref()).await?;
    debug!(?desired, endpoint = %resolved.endpoint, "converging");

    let client = Instrumented::new(K::capability(ctx.factory.as_ref(), &resolved)?, K::CAPABILITY);
    let convergence = obj.converge(&client, &desired, &ctx.config).await?;
    Ok((desired, convergence))
}

async fn finalize<K, S>(
    obj: &K,
    namespace: &str,
    ctx: &Context<S>,
    written: &mut Vec<String>,
) -> Result<Outcome, ReconcilerError>
where
    K: ManagedResource,
    S: ResourceStore,
{
    if !has_finalizer(obj, K::FINALIZER) {
        return Ok(Outcome::Gone);
    }

    if obj.requires_remote_cleanup() {
        if let Err(e) = cleanup_remote(obj, namespace, ctx).await {
            if e.is_conflict() {
                return Err(e);
            }
            warn!(
                reason = e.reason(),
                error = %e,
                "cleanup failed, keeping finalizer"
            );
            let mut current = obj.clone();
            status::mark_cleanup_failed(current.status_mut(), &e, Utc::now());
            let saved = ctx.store.replace_status(&current).await?;
            written.extend(saved.resource_version());
            return Ok(Outcome::CleanupFailed {
                reason: e.reason(),
                message: e.to_string(),
            });
        }
    }

    ctx.store.remove_finalizer(obj, K::FINALIZER).await?;
    metrics::increment_finalizer_operations(K::KIND, "remove");
    info!(finalizer = K::FINALIZER, "cleanup complete, finalizer removed");
    Ok(Outcome::Removed)
}

async fn cleanup_remote<K, S>(
    obj: &K,
    namespace: &str,
    ctx: &Context<S>,
) -> Result<(), ReconcilerError>
where
    K: ManagedResource,
    S: ResourceStore,
{
    let reference = obj.connection()?;
    let resolved = ConnectionResolver::new(ctx.lookup.as_ref())
        .resolve(&reference, namespace)
        .await?;
    let client = Instrumented::new(K::capability(ctx.factory.as_ref(), &resolved)?, K::CAPABILITY);
    obj.cleanup(&client).await
}
