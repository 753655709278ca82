//! # S3 API
//!
//! Buckets and bucket lifecycle configuration through `aws-sdk-s3`, pointed at the
//! MinIO endpoint with static credentials.

use crate::constants::DEFAULT_REGION;
use crate::controller::connection::ResolvedConnectionConfig;
use super::transport::InsecureHttpClient;
use crate::controller::reconciler::validation::parse_rule_date;
use crate::crd::{LifecycleRule as RuleSpec, RuleFilter, RuleStatus};
use crate::provider::{
    BucketDesired, CapabilityClient, LifecycleDesired, ProviderError, RemoteMetadata,
    UpsertReport,
};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{DateTime, DateTimeFormat};
use aws_sdk_s3::types::{
    AbortIncompleteMultipartUpload, BucketLifecycleConfiguration, BucketLocationConstraint,
    BucketVersioningStatus, CreateBucketConfiguration, Delete, Error as S3Error,
    ExpirationStatus, LifecycleExpiration, LifecycleRule, LifecycleRuleAndOperator,
    LifecycleRuleFilter, NoncurrentVersionExpiration, NoncurrentVersionTransition,
    ObjectIdentifier, Tag, Tagging, Transition, TransitionStorageClass, VersioningConfiguration,
};
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::{debug, info};

const NO_SUCH_BUCKET: &str = "NoSuchBucket";
const NO_SUCH_LIFECYCLE: &str = "NoSuchLifecycleConfiguration";

/// Build an S3 client for one resolved connection
pub fn client(cfg: &ResolvedConnectionConfig, timeout: Duration) -> Result<Client, ProviderError> {
    let region = cfg
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let mut builder = aws_sdk_s3::Config::builder();
    if cfg.insecure_tls {
        debug!(endpoint = %cfg.endpoint, "S3 client skips certificate verification");
        let http = InsecureHttpClient::new(timeout).map_err(|e| {
            ProviderError::Connectivity(format!("failed to build HTTP client: {e}"))
        })?;
        builder = builder.http_client(http);
    }
    let config = builder
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region))
        .endpoint_url(cfg.endpoint.trim_end_matches('/'))
        .credentials_provider(Credentials::new(
            cfg.access_key_id.clone(),
            cfg.secret_access_key.clone(),
            None,
            None,
            "minio-resource-controller",
        ))
        .force_path_style(cfg.path_style)
        .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
        .build();
    Ok(Client::from_conf(config))
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn is_absent<E>(err: &SdkError<E, HttpResponse>, codes: &[&str]) -> bool
where
    E: ProvideErrorMetadata,
{
    status_of(err) == Some(404) || err.code().is_some_and(|c| codes.contains(&c))
}

fn classify<E>(operation: &str, err: &SdkError<E, HttpResponse>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let detail = format!("{operation}: {}", DisplayErrorContext(err));
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ProviderError::Connectivity(detail)
        }
        SdkError::ServiceError(_) | SdkError::ResponseError(_) => match status_of(err) {
            Some(401 | 403) | None => ProviderError::Connectivity(detail),
            Some(status) if status >= 500 => ProviderError::Connectivity(detail),
            Some(_) => ProviderError::UpstreamState(detail),
        },
        _ => ProviderError::Unsupported(detail),
    }
}

fn invalid_request(err: &BuildError) -> ProviderError {
    ProviderError::Unsupported(format!("invalid request: {err}"))
}

/// Buckets, including versioning, object locking and tags
#[derive(Debug)]
pub struct S3Buckets {
    client: Client,
}

impl S3Buckets {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn create(&self, name: &str, desired: &BucketDesired) -> Result<bool, ProviderError> {
        let mut request = self.client.create_bucket().bucket(name);
        if let Some(region) = desired.region.as_deref().filter(|r| *r != DEFAULT_REGION) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        if desired.object_locking {
            request = request.object_lock_enabled_for_bucket(true);
        }
        match request.send().await {
            Ok(_) => {
                info!(bucket = name, "Created bucket");
                Ok(true)
            }
            Err(e) if e.code() == Some("BucketAlreadyOwnedByYou") => Ok(false),
            Err(e) => Err(classify("create_bucket", &e)),
        }
    }

    async fn apply_versioning(&self, name: &str, desired: &BucketDesired) -> Result<(), ProviderError> {
        let Some(enabled) = desired.versioning else {
            return Ok(());
        };
        // Object-locked buckets must stay versioned
        if !enabled && desired.object_locking {
            return Ok(());
        }
        let current = self
            .client
            .get_bucket_versioning()
            .bucket(name)
            .send()
            .await
            .map_err(|e| classify("get_bucket_versioning", &e))?;
        let wanted = if enabled {
            BucketVersioningStatus::Enabled
        } else {
            BucketVersioningStatus::Suspended
        };
        match current.status() {
            Some(status) if *status == wanted => return Ok(()),
            // Never-versioned buckets are already unversioned
            None if !enabled => return Ok(()),
            _ => {}
        }
        self.client
            .put_bucket_versioning()
            .bucket(name)
            .versioning_configuration(VersioningConfiguration::builder().status(wanted).build())
            .send()
            .await
            .map_err(|e| classify("put_bucket_versioning", &e))?;
        Ok(())
    }

    async fn apply_tags(&self, name: &str, desired: &BucketDesired) -> Result<(), ProviderError> {
        if desired.tags.is_empty() {
            self.client
                .delete_bucket_tagging()
                .bucket(name)
                .send()
                .await
                .map_err(|e| classify("delete_bucket_tagging", &e))?;
            return Ok(());
        }
        let tags = desired
            .tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid_request(&e))?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tags))
            .build()
            .map_err(|e| invalid_request(&e))?;
        self.client
            .put_bucket_tagging()
            .bucket(name)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| classify("put_bucket_tagging", &e))?;
        Ok(())
    }

    /// Remove every object version and delete marker
    async fn empty(&self, name: &str) -> Result<(), ProviderError> {
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;
        loop {
            let page = self
                .client
                .list_object_versions()
                .bucket(name)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(|e| classify("list_object_versions", &e))?;

            let versions = page
                .versions()
                .iter()
                .map(|v| (v.key(), v.version_id()))
                .chain(page.delete_markers().iter().map(|m| (m.key(), m.version_id())));
            let mut objects = Vec::new();
            for (key, version) in versions {
                let Some(key) = key else { continue };
                objects.push(
                    ObjectIdentifier::builder()
                        .key(key)
                        .set_version_id(version.map(str::to_owned))
                        .build()
                        .map_err(|e| invalid_request(&e))?,
                );
            }

            if !objects.is_empty() {
                debug!(bucket = name, count = objects.len(), "Deleting object versions");
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .map_err(|e| invalid_request(&e))?;
                let output = self
                    .client
                    .delete_objects()
                    .bucket(name)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| classify("delete_objects", &e))?;
                if let Some(err) = rejected_deletes(name, output.errors()) {
                    return Err(err);
                }
            }

            if !page.is_truncated().unwrap_or(false) {
                return Ok(());
            }
            key_marker = page.next_key_marker().map(str::to_owned);
            version_marker = page.next_version_id_marker().map(str::to_owned);
        }
    }
}

/// Per-key failures reported by a quiet `DeleteObjects` call
fn rejected_deletes(bucket: &str, errors: &[S3Error]) -> Option<ProviderError> {
    if errors.is_empty() {
        return None;
    }
    let keys: Vec<String> = errors
        .iter()
        .map(|e| {
            format!(
                "{} ({})",
                e.key().unwrap_or("<unknown>"),
                e.code().unwrap_or("UnknownError")
            )
        })
        .collect();
    Some(ProviderError::UpstreamState(format!(
        "bucket {bucket}: {} object(s) could not be deleted: {}",
        keys.len(),
        keys.join(", ")
    )))
}

#[async_trait]
impl CapabilityClient<BucketDesired> for S3Buckets {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_absent(&e, &[NO_SUCH_BUCKET, "NotFound"]) => Ok(false),
            Err(e) => Err(classify("head_bucket", &e)),
        }
    }

    async fn upsert(&self, name: &str, desired: &BucketDesired) -> Result<UpsertReport, ProviderError> {
        let created = if self.exists(name).await? {
            false
        } else {
            self.create(name, desired).await?
        };
        self.apply_versioning(name, desired).await?;
        self.apply_tags(name, desired).await?;
        Ok(UpsertReport {
            created,
            warnings: Vec::new(),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        if !self.exists(name).await? {
            return Ok(());
        }
        self.empty(name).await?;
        match self.client.delete_bucket().bucket(name).send().await {
            Ok(_) => {
                info!(bucket = name, "Deleted bucket");
                Ok(())
            }
            Err(e) if is_absent(&e, &[NO_SUCH_BUCKET]) => Ok(()),
            Err(e) => Err(classify("delete_bucket", &e)),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.client
            .list_buckets()
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify("list_buckets", &e))
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        let location = match self.client.get_bucket_location().bucket(name).send().await {
            Ok(location) => location,
            Err(e) if is_absent(&e, &[NO_SUCH_BUCKET]) => {
                return Err(ProviderError::UpstreamState(format!(
                    "bucket {name} does not exist"
                )))
            }
            Err(e) => return Err(classify("get_bucket_location", &e)),
        };
        let region = location
            .location_constraint()
            .map(|c| c.as_str().to_owned())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let buckets = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify("list_buckets", &e))?;
        let created_at = buckets
            .buckets()
            .iter()
            .find(|b| b.name() == Some(name))
            .and_then(|b| b.creation_date())
            .and_then(|d| d.fmt(DateTimeFormat::DateTime).ok());

        Ok(RemoteMetadata {
            name: name.to_owned(),
            region: Some(region),
            version: None,
            created_at,
        })
    }
}

fn to_date(date: &str) -> Result<DateTime, ProviderError> {
    parse_rule_date(date)
        .map(DateTime::from_secs)
        .map_err(|e| ProviderError::Unsupported(e.to_string()))
}

fn to_tags<'a>(
    tags: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Result<Vec<Tag>, ProviderError> {
    tags.into_iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build())
        .collect::<Result<_, _>>()
        .map_err(|e| invalid_request(&e))
}

fn to_filter(filter: Option<&RuleFilter>) -> Result<LifecycleRuleFilter, ProviderError> {
    let Some(filter) = filter else {
        return Ok(LifecycleRuleFilter::builder().prefix("").build());
    };
    if let Some(and) = &filter.and {
        let operator = LifecycleRuleAndOperator::builder()
            .set_prefix(and.prefix.clone())
            .set_tags(Some(to_tags(&and.tags)?))
            .build();
        return Ok(LifecycleRuleFilter::builder().and(operator).build());
    }
    let mut tags = to_tags(&filter.tags)?;
    let builder = LifecycleRuleFilter::builder();
    Ok(match (filter.prefix.clone(), tags.len()) {
        (None, 1) => builder.set_tag(tags.pop()).build(),
        (prefix, 0) => builder.prefix(prefix.unwrap_or_default()).build(),
        (prefix, _) => builder
            .and(
                LifecycleRuleAndOperator::builder()
                    .set_prefix(prefix)
                    .set_tags(Some(tags))
                    .build(),
            )
            .build(),
    })
}

/// Translate one rule into its S3 wire form
fn to_rule(rule: &RuleSpec) -> Result<LifecycleRule, ProviderError> {
    let status = match rule.status {
        RuleStatus::Enabled => ExpirationStatus::Enabled,
        RuleStatus::Disabled => ExpirationStatus::Disabled,
    };
    let mut builder = LifecycleRule::builder()
        .id(&rule.id)
        .status(status)
        .filter(to_filter(rule.filter.as_ref())?);

    if let Some(expiration) = &rule.expiration {
        builder = builder.expiration(
            LifecycleExpiration::builder()
                .set_days(expiration.days)
                .set_date(expiration.date.as_deref().map(to_date).transpose()?)
                .set_expired_object_delete_marker(expiration.expired_object_delete_marker)
                .build(),
        );
    }
    if let Some(noncurrent) = &rule.noncurrent_version_expiration {
        builder = builder.noncurrent_version_expiration(
            NoncurrentVersionExpiration::builder()
                .noncurrent_days(noncurrent.noncurrent_days)
                .build(),
        );
    }
    if let Some(abort) = &rule.abort_incomplete_multipart_upload {
        builder = builder.abort_incomplete_multipart_upload(
            AbortIncompleteMultipartUpload::builder()
                .days_after_initiation(abort.days_after_initiation)
                .build(),
        );
    }
    for transition in &rule.transitions {
        builder = builder.transitions(
            Transition::builder()
                .set_days(transition.days)
                .set_date(transition.date.as_deref().map(to_date).transpose()?)
                .storage_class(TransitionStorageClass::from(transition.storage_class.as_str()))
                .build(),
        );
    }
    for transition in &rule.noncurrent_version_transitions {
        builder = builder.noncurrent_version_transitions(
            NoncurrentVersionTransition::builder()
                .noncurrent_days(transition.noncurrent_days)
                .storage_class(TransitionStorageClass::from(transition.storage_class.as_str()))
                .build(),
        );
    }
    builder.build().map_err(|e| invalid_request(&e))
}

/// Bucket lifecycle configuration; the remote name is the bucket name
#[derive(Debug)]
pub struct S3Lifecycle {
    client: Client,
}

impl S3Lifecycle {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ProviderError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_absent(&e, &[NO_SUCH_BUCKET, "NotFound"]) => Ok(false),
            Err(e) => Err(classify("head_bucket", &e)),
        }
    }
}

#[async_trait]
impl CapabilityClient<LifecycleDesired> for S3Lifecycle {
    async fn exists(&self, name: &str) -> Result<bool, ProviderError> {
        match self
            .client
            .get_bucket_lifecycle_configuration()
            .bucket(name)
            .send()
            .await
        {
            Ok(config) => Ok(!config.rules().is_empty()),
            Err(e) if is_absent(&e, &[NO_SUCH_LIFECYCLE, NO_SUCH_BUCKET]) => Ok(false),
            Err(e) => Err(classify("get_bucket_lifecycle_configuration", &e)),
        }
    }

    async fn upsert(
        &self,
        name: &str,
        desired: &LifecycleDesired,
    ) -> Result<UpsertReport, ProviderError> {
        if !self.bucket_exists(name).await? {
            return Err(ProviderError::UpstreamState(format!(
                "bucket {name} does not exist"
            )));
        }
        let existed = self.exists(name).await?;
        let rules = desired
            .rules
            .iter()
            .map(to_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let configuration = BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(|e| invalid_request(&e))?;
        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(name)
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(|e| classify("put_bucket_lifecycle_configuration", &e))?;
        Ok(UpsertReport {
            created: !existed,
            warnings: Vec::new(),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        match self.client.delete_bucket_lifecycle().bucket(name).send().await {
            Ok(_) => Ok(()),
            Err(e) if is_absent(&e, &[NO_SUCH_LIFECYCLE, NO_SUCH_BUCKET]) => Ok(()),
            Err(e) => Err(classify("delete_bucket_lifecycle", &e)),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.client
            .list_buckets()
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify("list_buckets", &e))
    }

    async fn describe(&self, name: &str) -> Result<RemoteMetadata, ProviderError> {
        if self.exists(name).await? {
            Ok(RemoteMetadata {
                name: name.to_owned(),
                ..RemoteMetadata::default()
            })
        } else {
            Err(ProviderError::UpstreamState(format!(
                "bucket {name} has no lifecycle configuration"
            )))
        }
    }
}
