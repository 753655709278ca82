//! # Watch Loop
//!
//! One kube-runtime controller per resource kind, all sharing a context. The loop
//! returns once every controller has drained after SIGTERM/SIGINT.

use super::error_policy::{error_policy, handle_controller_error};
use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, Context, KubeStore, ManagedResource};
use crate::controller::server::ServerState;
use crate::crd::{Alias, Bucket, Endpoint, LifecyclePolicy, Policy, PolicyAttachment, User};
use anyhow::Result;
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info};

fn api_for<K: ManagedResource>(client: Client, config: &ControllerConfig) -> Api<K> {
    match config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

async fn run_controller<K: ManagedResource>(client: Client, ctx: Arc<Context<KubeStore>>) {
    let api = api_for::<K>(client, &ctx.config);
    let concurrency = ctx.config.concurrency;
    info!(resource.kind = K::KIND, concurrency, "Starting controller");

    Controller::new(api, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile::<K, KubeStore>, error_policy::<K, KubeStore>, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(resource.kind = K::KIND, object = %obj, ?action, "reconciled");
                }
                Err(e) => handle_controller_error(K::KIND, &e),
            }
        })
        .await;

    info!(resource.kind = K::KIND, "Controller stopped");
}

/// Run every controller until shutdown
pub async fn run_watch_loop(
    client: Client,
    ctx: Arc<Context<KubeStore>>,
    server_state: Arc<ServerState>,
) -> Result<()> {
    futures::join!(
        run_controller::<Alias>(client.clone(), Arc::clone(&ctx)),
        run_controller::<Endpoint>(client.clone(), Arc::clone(&ctx)),
        run_controller::<Bucket>(client.clone(), Arc::clone(&ctx)),
        run_controller::<User>(client.clone(), Arc::clone(&ctx)),
        run_controller::<Policy>(client.clone(), Arc::clone(&ctx)),
        run_controller::<PolicyAttachment>(client.clone(), Arc::clone(&ctx)),
        run_controller::<LifecyclePolicy>(client, ctx),
    );

    server_state.set_ready(false);
    info!("All controllers stopped, shutting down");
    Ok(())
}
