//! # MinIO Resource Controller
//!
//! Watches Alias, Endpoint, Bucket, User, Policy, PolicyAttachment and
//! LifecyclePolicy resources and reconciles them against MinIO.
//!
//! Configuration comes from environment variables; see `config` for the full list.

use anyhow::Result;
use minio_resource_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.client,
        init_result.context,
        init_result.server_state,
    )
    .await
}
