//! Alias reconciliation: probe the server and publish its health.

use super::super::lifecycle::{Convergence, ManagedResource};
use super::super::types::ReconcilerError;
use super::server::{probe_server, project_server, project_unhealthy, ServerSpec};
use crate::config::ControllerConfig;
use crate::controller::connection::{ClusterLookup, ConnectionReference, ResolvedConnectionConfig};
use crate::crd::{Alias, ResourceStatus};
use crate::provider::{Capability, CapabilityClient, CapabilityFactory, ProviderError, ServerProbe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const ALIAS_FINALIZER: &str = "alias.minio.mxcd.dev/finalizer";

impl Alias {
    fn server(&self) -> ServerSpec<'_> {
        ServerSpec {
            url: &self.spec.url,
            secret_ref: &self.spec.secret_ref,
            tls: self.spec.tls.as_ref(),
            region: self.spec.region.as_ref(),
            path_style: self.spec.path_style,
            health_check: self.spec.health_check.as_ref(),
        }
    }
}

#[async_trait]
impl ManagedResource for Alias {
    type Desired = ServerProbe;

    const KIND: &'static str = "Alias";
    const FINALIZER: &'static str = ALIAS_FINALIZER;
    const CAPABILITY: &'static str = "server";

    fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        self.server().connection()
    }

    fn remote_name(&self) -> String {
        self.spec.url.clone()
    }

    async fn desired_state(&self, _lookup: &dyn ClusterLookup) -> Result<ServerProbe, ReconcilerError> {
        Ok(self.server().probe())
    }

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<ServerProbe>, ProviderError> {
        factory.servers(cfg)
    }

    async fn converge(
        &self,
        client: &dyn CapabilityClient<ServerProbe>,
        desired: &ServerProbe,
        _config: &ControllerConfig,
    ) -> Result<Convergence, ReconcilerError> {
        probe_server(client, desired, &self.remote_name()).await
    }

    fn requires_remote_cleanup(&self) -> bool {
        false
    }

    fn status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref().map(|s| &s.common)
    }

    fn status_mut(&mut self) -> &mut ResourceStatus {
        &mut self.status.get_or_insert_with(Default::default).common
    }

    fn project(&mut self, _desired: &ServerProbe, convergence: &Convergence, now: DateTime<Utc>) {
        let url = self.spec.url.clone();
        let region = self.spec.region.clone();
        let status = self.status.get_or_insert_with(Default::default);
        project_server(status, &url, region.as_ref(), convergence, now);
    }

    fn project_failure(&mut self, _error: &ReconcilerError, now: DateTime<Utc>) {
        project_unhealthy(self.status.get_or_insert_with(Default::default), now);
    }

    fn steady_state_interval(&self, config: &ControllerConfig) -> Duration {
        self.server().interval(config)
    }
}
