//! # MinIO Admin API
//!
//! Users, canned policies, policy attachments and server info live behind the
//! admin REST API (`/minio/admin/v3`). Requests are signed with SigV4 like S3
//! requests; bodies carrying secrets are encrypted with the caller's secret key.

mod crypto;

use crate::constants::DEFAULT_REGION;
use crate::controller::connection::ResolvedConnectionConfig;
use crate::provider::{
    AttachmentDesired, AttachmentTarget, CapabilityClient, PolicyDesired, ProviderError,
    RemoteMetadata, ServerProbe, UpsertReport, UserDesired,
};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use zeroize::Zeroizing;

const ADMIN_PREFIX: &str = "minio/admin/v3";

/// Error document returned by the admin API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AdminErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    #[serde(default)]
    policy_name: Option<String>,
    #[serde(default)]
    member_of: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    servers: Vec<ServerProperties>,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerProperties {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddUserBody<'a> {
    secret_key: &'a str,
    status: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupMembersBody<'a> {
    group: &'a str,
    members: Vec<&'a str>,
    is_remove: bool,
    status: &'a str,
}

/// Signed HTTP access to one server's admin API
pub struct AdminClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
    secret_key: Zeroizing<String>,
    region: String,
}

impl fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminClient")
            .field("base", &self.base.as_str())
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AdminClient {
    pub fn new(cfg: &ResolvedConnectionConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let base = Url::parse(&cfg.endpoint).map_err(|e| {
            ProviderError::Unsupported(format!("invalid server URL {}: {e}", cfg.endpoint))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(cfg.insecure_tls)
            .build()
            .map_err(|e| ProviderError::Connectivity(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base,
            credentials: Credentials::new(
                cfg.access_key_id.clone(),
                cfg.secret_access_key.clone(),
                None,
                None,
                "minio-resource-controller",
            ),
            secret_key: Zeroizing::new(cfg.secret_access_key.clone()),
            region: cfg
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut url = self
            .base
            .join(&format!("{ADMIN_PREFIX}/{path}"))
            .map_err(|e| ProviderError::Unsupported(format!("invalid admin path {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn signature_headers(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
    ) -> Result<Vec<(String, String)>, ProviderError> {
        let identity: Identity = self.credentials.clone().into();
        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name("s3")
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(|e| ProviderError::Unsupported(format!("signing parameters: {e}")))?
            .into();
        let signable = SignableRequest::new(
            method.as_str(),
            url.as_str(),
            std::iter::empty(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| ProviderError::Unsupported(format!("unsignable request: {e}")))?;
        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| ProviderError::Unsupported(format!("signing failed: {e}")))?
            .into_parts();
        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect())
    }

    /// Issue a signed call; `Ok(None)` when the target object does not exist
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, ProviderError> {
        let url = self.url(path, query)?;
        let mut request = self.http.request(method.clone(), url.clone());
        for (name, value) in self.signature_headers(&method, &url, &body)? {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Connectivity(format!("{path}: {e}")))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Connectivity(format!("{path}: reading response: {e}")))?;
        debug!(path, status = status.as_u16(), "admin call finished");

        if status.is_success() {
            return Ok(Some(bytes.to_vec()));
        }
        let error: AdminErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        classify_admin_error(path, status.as_u16(), &error.code, &error.message)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, ProviderError> {
        let Some(body) = self.call(Method::GET, path, query, Vec::new()).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ProviderError::UpstreamState(format!("{path}: unexpected response: {e}")))
    }

    async fn user_info(&self, name: &str) -> Result<Option<UserInfo>, ProviderError> {
        self.get_json("user-info", &[("accessKey", name)]).await
    }

    async fn group_exists(&self, name: &str) -> Result<bool, ProviderError> {
        Ok(self
            .call(Method::GET, "group", &[("group", name)], Vec::new())
            .await?
            .is_some())
    }

    async fn set_policy(&self, policy: &str, target: &AttachmentTarget) -> Result<bool, ProviderError> {
        let is_group = if target.is_group() { "true" } else { "false" };
        Ok(self
            .call(
                Method::PUT,
                "set-user-or-group-policy",
                &[
                    ("policyName", policy),
                    ("userOrGroup", target.name()),
                    ("isGroup", is_group),
                ],
                Vec::new(),
            )
            .await?
            .is_some())
    }

    async fn add_to_group(&self, group: &str, user: &str) -> Result<(), ProviderError> {
        let body = serde_json::to_vec(&GroupMembersBody {
            group,
            members: vec![user],
            is_remove: false,
            status: "enabled",
        })
        .map_err(|e| ProviderError::Unsupported(format!("group members body: {e}")))?;
        self.call(Method::PUT, "update-group-members", &[], body)
            .await?;
        Ok(())
    }

    /// Unsigned liveness probe
    async fn live(&self) -> Result<(), ProviderError> {
        let url = self
            .base
            .join("minio/health/live")
            .map_err(|e| ProviderError::Unsupported(format!("invalid health URL: {e}")))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Connectivity(format!("health check: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Connectivity(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

fn classify_admin_error<T>(
    path: &str,
    status: u16,
    code: &str,
    message: &str,
) -> Result<Option<T>, ProviderError> {
    if status == 404 || code.starts_with("XMinioAdminNoSuch") {
        return Ok(None);
    }
    let detail = format!("{path}: {status} {code}: {message}");
    if status == 401 || status == 403 || status >= 500 {
        Err(ProviderError::Connectivity(detail))
    } else {
        Err(ProviderError::UpstreamState(detail))
    }
}

/// Server probes: liveness plus version from the admin info call
#[derive(Debug)]
pub struct AdminServer {
    admin: AdminClient,
}

impl AdminServer {
    pub fn new(admin: AdminClient) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl CapabilityClient<ServerProbe> for AdminServer {
    async fn exists(&self, _name: &str) -> Result<bool, ProviderError> {
        self.admin.live().await.map(|()| true)
    }

    async fn upsert(&self, _name: &str, _desired: &ServerProbe) -> Result<UpsertReport, ProviderError> {
        Ok(UpsertReport::updated())
    }

    async fn delete(&self, _name: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.admin.live().await
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        let info: ServerInfo = self
            .admin
            .get_json("info", &[])
            .await?
            .ok_or_else(|| ProviderError::UpstreamState("server info unavailable".to_string()))?;
        Ok(RemoteMetadata {
            name: name.to_owned(),
            region: info.region.filter(|r| !r.is_empty()),
            version: info.servers.into_iter().find_map(|s| s.version),
            created_at: None,
        })
    }
}

/// IAM users
#[derive(Debug)]
pub struct AdminUsers {
    admin: AdminClient,
}

impl AdminUsers {
    pub fn new(admin: AdminClient) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl CapabilityClient<UserDesired> for AdminUsers {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        Ok(self.admin.user_info(name).await?.is_some())
    }

    async fn upsert(&self, name: &str, desired: &UserDesired) -> Result<UpsertReport, ProviderError> {
        let existing = self.admin.user_info(name).await?;

        let plain = Zeroizing::new(
            serde_json::to_vec(&AddUserBody {
                secret_key: &desired.secret_key,
                status: desired.status.as_str(),
            })
            .map_err(|e| ProviderError::Unsupported(format!("add-user body: {e}")))?,
        );
        let body = crypto::encrypt_data(&self.admin.secret_key, &plain)
            .map_err(|e| ProviderError::Unsupported(e.to_string()))?;
        self.admin
            .call(Method::PUT, "add-user", &[("accessKey", name)], body)
            .await?;

        let mut warnings = Vec::new();
        let member_of = existing
            .as_ref()
            .and_then(|info| info.member_of.clone())
            .unwrap_or_default();
        for group in desired.groups.iter().filter(|g| !member_of.contains(g)) {
            if let Err(e) = self.admin.add_to_group(group, name).await {
                warn!(user = name, group, error = %e, "adding user to group failed");
                warnings.push(format!("group {group}: {e}"));
            }
        }

        if !desired.policies.is_empty() {
            let wanted = desired.policies.join(",");
            let current = existing.as_ref().and_then(|info| info.policy_name.as_deref());
            if current != Some(wanted.as_str()) {
                let target = AttachmentTarget::User(name.to_owned());
                if let Err(e) = self.admin.set_policy(&wanted, &target).await {
                    warn!(user = name, error = %e, "attaching user policies failed");
                    warnings.push(format!("policies {wanted}: {e}"));
                }
            }
        }

        Ok(UpsertReport {
            created: existing.is_none(),
            warnings,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        self.admin
            .call(Method::DELETE, "remove-user", &[("accessKey", name)], Vec::new())
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.admin.live().await
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        match self.admin.user_info(name).await? {
            Some(_) => Ok(RemoteMetadata {
                name: name.to_owned(),
                ..RemoteMetadata::default()
            }),
            None => Err(ProviderError::UpstreamState(format!("user {name} does not exist"))),
        }
    }
}

/// Canned policies
#[derive(Debug)]
pub struct AdminPolicies {
    admin: AdminClient,
}

impl AdminPolicies {
    pub fn new(admin: AdminClient) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl CapabilityClient<PolicyDesired> for AdminPolicies {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        Ok(self
            .admin
            .call(Method::GET, "info-canned-policy", &[("name", name)], Vec::new())
            .await?
            .is_some())
    }

    async fn upsert(&self, name: &str, desired: &PolicyDesired) -> Result<UpsertReport, ProviderError> {
        let existed = self.exists(name).await?;
        self.admin
            .call(
                Method::PUT,
                "add-canned-policy",
                &[("name", name)],
                desired.document.clone().into_bytes(),
            )
            .await?;
        Ok(UpsertReport {
            created: !existed,
            warnings: Vec::new(),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        self.admin
            .call(Method::DELETE, "remove-canned-policy", &[("name", name)], Vec::new())
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.admin.live().await
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        if self.exists(name).await? {
            Ok(RemoteMetadata {
                name: name.to_owned(),
                ..RemoteMetadata::default()
            })
        } else {
            Err(ProviderError::UpstreamState(format!("policy {name} does not exist")))
        }
    }
}

/// Policy attachments, keyed by `user:<name>` / `group:<name>`
#[derive(Debug)]
pub struct AdminAttachments {
    admin: AdminClient,
}

impl AdminAttachments {
    pub fn new(admin: AdminClient) -> Self {
        Self { admin }
    }

    async fn target_exists(&self, target: &AttachmentTarget) -> Result<bool, ProviderError> {
        match target {
            AttachmentTarget::User(name) => Ok(self.admin.user_info(name).await?.is_some()),
            AttachmentTarget::Group(name) => self.admin.group_exists(name).await,
        }
    }
}

#[async_trait]
impl CapabilityClient<AttachmentDesired> for AdminAttachments {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        match AttachmentTarget::parse(name) {
            Some(target) => self.target_exists(&target).await,
            None => Ok(false),
        }
    }

    async fn upsert(
        &self,
        _name: &str,
        desired: &AttachmentDesired,
    ) -> Result<UpsertReport, ProviderError> {
        if !self.target_exists(&desired.target).await? {
            return Err(ProviderError::UpstreamState(format!(
                "attachment target {} does not exist",
                desired.target.key()
            )));
        }
        if !self.admin.set_policy(&desired.policy_name, &desired.target).await? {
            return Err(ProviderError::UpstreamState(format!(
                "policy {} or target {} does not exist",
                desired.policy_name,
                desired.target.key()
            )));
        }
        Ok(UpsertReport::updated())
    }

    /// Detach by setting an empty policy; missing targets are already detached
    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let Some(target) = AttachmentTarget::parse(name) else {
            return Ok(());
        };
        self.admin.set_policy("", &target).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.admin.live().await
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        Ok(RemoteMetadata {
            name: name.to_owned(),
            ..RemoteMetadata::default()
        })
    }
}
