//! User reconciliation. The password is read on every pass so rotating the
//! referenced secret is picked up without touching the User.

use super::super::lifecycle::{Convergence, ManagedResource};
use super::super::types::ReconcilerError;
use super::super::validation::validate_principal_name;
use super::{dependent_connection, ensure_unchanged, invalid, recorded_or_current};
use crate::constants::DEFAULT_PASSWORD_KEY;
use crate::controller::connection::{
    read_secret_key, ClusterLookup, ConnectionReference, ResolvedConnectionConfig,
};
use crate::crd::{format_timestamp, ResourceStatus, User};
use crate::provider::{Capability, CapabilityFactory, ProviderError, UserDesired};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::ResourceExt;

pub const USER_FINALIZER: &str = "user.minio.mxcd.dev/finalizer";

impl User {
    async fn password(&self, lookup: &dyn ClusterLookup) -> Result<String, ReconcilerError> {
        if let Some(password) = self.spec.password.as_ref().filter(|p| !p.is_empty()) {
            return Ok(password.clone());
        }
        let Some(secret_ref) = &self.spec.password_secret_ref else {
            return Err(ReconcilerError::Configuration(
                "either password or passwordSecretRef must be set".to_string(),
            ));
        };
        let namespace = secret_ref
            .namespace
            .clone()
            .unwrap_or_else(|| self.namespace().unwrap_or_default());
        let key = secret_ref.key.as_deref().unwrap_or(DEFAULT_PASSWORD_KEY);
        Ok(read_secret_key(lookup, &namespace, &secret_ref.name, key).await?)
    }
}

#[async_trait]
impl ManagedResource for User {
    type Desired = UserDesired;

    const KIND: &'static str = "User";
    const FINALIZER: &'static str = USER_FINALIZER;
    const CAPABILITY: &'static str = "user";

    fn connection(&self) -> Result<ConnectionReference, ReconcilerError> {
        dependent_connection(&self.spec.connection)
    }

    fn remote_name(&self) -> String {
        self.spec.username.clone()
    }

    fn cleanup_name(&self) -> String {
        recorded_or_current(
            self.status.as_ref().and_then(|s| s.username.as_deref()),
            &self.spec.username,
        )
    }

    async fn desired_state(&self, lookup: &dyn ClusterLookup) -> Result<UserDesired, ReconcilerError> {
        validate_principal_name(&self.spec.username, "username").map_err(invalid)?;
        ensure_unchanged(
            "username",
            self.status.as_ref().and_then(|s| s.username.as_deref()),
            &self.spec.username,
        )?;
        for policy in &self.spec.policies {
            validate_principal_name(policy, "policies").map_err(invalid)?;
        }
        Ok(UserDesired {
            secret_key: self.password(lookup).await?,
            status: self.spec.status,
            groups: self.spec.groups.clone(),
            policies: self.spec.policies.clone(),
        })
    }

    fn capability(
        factory: &dyn CapabilityFactory,
        cfg: &ResolvedConnectionConfig,
    ) -> Result<Capability<UserDesired>, ProviderError> {
        factory.users(cfg)
    }

    fn status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref().map(|s| &s.common)
    }

    fn status_mut(&mut self) -> &mut ResourceStatus {
        &mut self.status.get_or_insert_with(Default::default).common
    }

    fn project(&mut self, desired: &UserDesired, convergence: &Convergence, now: DateTime<Utc>) {
        let username = self.spec.username.clone();
        let status = self.status.get_or_insert_with(Default::default);
        status.username = Some(username);
        status.status = Some(desired.status);
        status.groups = desired.groups.clone();
        status.policies = desired.policies.clone();
        if convergence.created || status.creation_date.is_none() {
            status.creation_date = Some(format_timestamp(now));
        }
    }
}
