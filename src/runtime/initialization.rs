//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, probe server and the shared
//! reconcile context.

use crate::config::{load_config, ProbeServerConfig};
use crate::controller::connection::KubeLookup;
use crate::controller::reconciler::{Context, KubeStore};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::provider::minio::MinioCapabilityFactory;
use anyhow::{Context as _, Result};
use kube::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub context: Arc<Context<KubeStore>>,
    pub server_state: Arc<ServerState>,
}

impl fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializationResult")
            .field("context", &self.context)
            .field("server_state", &self.server_state)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// The probe server is bound before the Kubernetes client is created so that
/// liveness checks pass while the API server is slow to answer.
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minio_resource_controller=info".into()),
        )
        .init();

    if !provider_installed {
        warn!("rustls crypto provider was already installed, keeping the existing one");
    }
    info!("Starting MinIO Resource Controller v{}", env!("CARGO_PKG_VERSION"));

    let (controller_config, server_config) = load_config();
    info!(
        error_requeue_secs = controller_config.error_requeue.as_secs(),
        steady_state_requeue_secs = controller_config.steady_state_requeue.as_secs(),
        remote_call_timeout_secs = controller_config.remote_call_timeout.as_secs(),
        concurrency = controller_config.concurrency,
        watch_namespace = controller_config.watch_namespace.as_deref().unwrap_or("<all>"),
        "Loaded controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let addr = server_config.socket_addr();
        tokio::spawn(async move {
            if let Err(e) = start_server(addr, state).await {
                error!("HTTP server error: {e:#}");
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let factory = MinioCapabilityFactory::from_config(&controller_config);
    let context = Arc::new(Context::new(
        KubeStore::new(client.clone()),
        Arc::new(KubeLookup::new(client.clone())),
        Arc::new(factory),
        controller_config,
    ));

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        context,
        server_state,
    })
}

/// Wait for the HTTP server to bind, failing if it crashes or takes too long
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ProbeServerConfig,
) -> Result<()> {
    let startup_timeout = config.startup_timeout;
    let poll_interval = config.poll_interval;
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {startup_timeout:?}"
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_fails_when_server_task_exits() {
        let state = ServerState::new();
        let handle = tokio::spawn(async {});
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = wait_for_server_ready(&state, &handle, &ProbeServerConfig::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wait_returns_once_ready() {
        let state = ServerState::new();
        state.set_ready(true);
        let handle = tokio::spawn(std::future::pending::<()>());
        let result = wait_for_server_ready(&state, &handle, &ProbeServerConfig::default()).await;
        handle.abort();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_startup_timeout() {
        let state = ServerState::new();
        let handle = tokio::spawn(std::future::pending::<()>());
        let config = ProbeServerConfig {
            startup_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
            ..ProbeServerConfig::default()
        };
        let result = wait_for_server_ready(&state, &handle, &config).await;
        handle.abort();
        let message = result.unwrap_err().to_string();
        assert!(message.contains("within 20ms"));
    }
}
