//! Bucket reconciliation.

use super::super::lifecycle::{Convergence, ManagedResource};
use super::super::types::ReconcilerError;
use super::super::validation::validate_bucket_name;
use super::{dependent_connection, ensure_unchanged, invalid, recorded_or_current};
use crate::controller::connection::{ClusterLookup, ConnectionReference, ResolvedConnectionConfig};
use crate::crd::{format_timestamp, Bucket, ResourceStatus};
use crate::provider::{BucketDesired, Capability, CapabilityFactory, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub const BUCKET_FINALIZER: &str = "bucket.mc-controller.mxcd.de/finalizer";

#[async_trait]
impl ManagedResource for Bucket {
    type Desired = BucketDesired;

    const KIND: &'static str = "Bucket";
    const FINALIZER: &'static str = BUCKET_FINALIZER;
    const CAPABILITY: &'static str = "bucket";

    fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        dependent_connection(&self.spec.connection)
    }

    fn remote_name(&self) -> String {
        self.spec.bucket_name.clone()
    }

    fn cleanup_name(&self) -> String {
        recorded_or_current(
            self.status.as_ref().and_then(|s| s.bucket_name.as_deref()),
            &self.spec.bucket_name,
        )
    }

    async fn desired_state(
        &self,
        _lookup: &dyn ClusterLookup,
    ) -> Result<BucketDesired, ReconcilerError> {
        validate_bucket_name(&self.spec.bucket_name).map_err(invalid)?;
        ensure_unchanged(
            "bucketName",
            self.status.as_ref().and_then(|s| s.bucket_name.as_deref()),
            &self.spec.bucket_name,
        )?;
        Ok(BucketDesired {
            region: self.spec.region.clone(),
            object_locking: self.spec.object_locking,
            versioning: self.spec.versioning,
            tags: self.spec.tags.clone(),
        })
    }

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<BucketDesired>, ProviderError> {
        factory.buckets(cfg)
    }

    fn status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref().map(|s| &s.common)
    }

    fn status_mut(&mut self) -> &mut ResourceStatus {
        &mut self.status.get_or_insert_with(Default::default).common
    }

    fn project(&mut self, desired: &BucketDesired, convergence: &Convergence, now: DateTime<Utc>) {
        let bucket_name = self.spec.bucket_name.clone();
        let status = self.status.get_or_insert_with(Default::default);
        status.bucket_name = Some(bucket_name);
        status.region = convergence
            .remote
            .as_ref()
            .and_then(|r| r.region.clone())
            .or_else(|| desired.region.clone());
        let reported = convergence.remote.as_ref().and_then(|r| r.created_at.clone());
        if reported.is_some() {
            status.creation_date = reported;
        } else if convergence.created || status.creation_date.is_none() {
            status.creation_date = Some(format_timestamp(now));
        }
    }
}
