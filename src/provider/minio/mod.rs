//! # MinIO
//!
//! Capability clients for a real MinIO deployment. Buckets and lifecycle rules go
//! through the S3 API; users, policies, attachments and server probes go through
//! the admin API. Clients are built per pass from the resolved connection, so
//! rotated credentials take effect on the next pass.

mod admin;
mod s3;
mod transport;

use crate::config::ControllerConfig;
use crate::controller::connection::ResolvedConnectionConfig;
use crate::provider::{
    AttachmentDesired, BucketDesired, Capability, CapabilityFactory, LifecycleDesired,
    PolicyDesired, ProviderError, ServerProbe, UserDesired,
};
use admin::{AdminAttachments, AdminClient, AdminPolicies, AdminServer, AdminUsers};
use s3::{S3Buckets, S3Lifecycle};
use std::time::Duration;

/// Builds MinIO clients bounded by the remote call timeout
#[derive(Debug, Clone)]
pub struct MinioCapabilityFactory {
    timeout: Duration,
}

impl MinioCapabilityFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.remote_call_timeout)
    }

    fn admin(&self, cfg: &ResolvedConnectionConfig) -> Result<AdminClient, ProviderError> {
        AdminClient::new(cfg, self.timeout)
    }
}

impl CapabilityFactory for MinioCapabilityFactory {
    fn servers(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<ServerProbe>, ProviderError> {
        Ok(Box::new(AdminServer::new(self.admin(cfg)?)))
    }

    fn buckets(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<BucketDesired>, ProviderError> {
        Ok(Box::new(S3Buckets::new(s3::client(cfg, self.timeout)?)))
    }

    fn users(&self, cfg: &ResolvedConnectionConfig) -> Result<Capability<UserDesired>, ProviderError> {
        Ok(Box::new(AdminUsers::new(self.admin(cfg)?)))
    }

    fn policies(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<PolicyDesired>, ProviderError> {
        Ok(Box::new(AdminPolicies::new(self.admin(cfg)?)))
    }

    fn policy_attachments(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<AttachmentDesired>, ProviderError> {
        Ok(Box::new(AdminAttachments::new(self.admin(cfg)?)))
    }

    fn lifecycle_policies(
        &self,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<LifecycleDesired>, ProviderError> {
        Ok(Box::new(S3Lifecycle::new(s3::client(cfg, self.timeout)?)))
    }
}
