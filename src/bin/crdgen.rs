//! Print every CRD served by the controller as multi-document YAML.
//!
//! Usage:
//!   cargo run --bin crdgen > config/crd/minio.mxcd.dev.yaml

use anyhow::Result;
use minio_resource_controller::crd::all_crds;

fn main() -> Result<()> {
    for crd in all_crds() {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
