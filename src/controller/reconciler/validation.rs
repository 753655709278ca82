//! # Validation
//!
//! Field-level validation for resource specs. Every failure becomes a
//! `ConfigurationError` on the resource.

use crate::crd::LifecycleRule;
use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;

/// Validate a server URL
/// Must be an absolute http:// or https:// URL with a host
pub fn validate_server_url(url: &str, field_name: &str) -> Result<()> {
    let url_trimmed = url.trim();

    if url_trimmed.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    let url_regex = Regex::new(r"^https?://[^\s/$.?#].[^\s]*$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !url_regex.is_match(url_trimmed) {
        return Err(anyhow::anyhow!(
            "{field_name} '{url_trimmed}' must be a valid URL starting with http:// or https://"
        ));
    }

    let parsed = reqwest::Url::parse(url_trimmed)
        .map_err(|e| anyhow::anyhow!("{field_name} '{url_trimmed}' is not a valid URL: {e}"))?;
    if parsed.host_str().is_none() {
        return Err(anyhow::anyhow!("{field_name} '{url_trimmed}' has no host"));
    }

    Ok(())
}

/// Validate an S3 bucket name
/// Length: 3-63 characters
/// Format: lowercase alphanumeric, hyphens, dots; must start and end with alphanumeric
/// Cannot contain consecutive dots or look like an IPv4 address
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(anyhow::anyhow!(
            "bucketName '{name}' must be between 3 and 63 characters (got {})",
            name.len()
        ));
    }

    let bucket_regex = Regex::new(r"^[a-z0-9][a-z0-9.-]*[a-z0-9]$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
    if !bucket_regex.is_match(name) {
        return Err(anyhow::anyhow!(
            "bucketName '{name}' must be lowercase alphanumeric, hyphens or dots, starting and ending with a letter or digit"
        ));
    }

    if name.contains("..") {
        return Err(anyhow::anyhow!(
            "bucketName '{name}' cannot contain consecutive dots"
        ));
    }

    let ip_regex = Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
    if ip_regex.is_match(name) {
        return Err(anyhow::anyhow!(
            "bucketName '{name}' cannot be formatted as an IP address"
        ));
    }

    Ok(())
}

/// Validate a user, group or policy name
/// Non-empty, at most 128 characters, no whitespace, no `/` and no `,`
pub fn validate_principal_name(name: &str, field_name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    if name.len() > 128 {
        return Err(anyhow::anyhow!(
            "{field_name} '{name}' exceeds maximum length of 128 characters (got {})",
            name.len()
        ));
    }

    if name.chars().any(|c| c.is_whitespace() || c == '/' || c == ',') {
        return Err(anyhow::anyhow!(
            "{field_name} '{name}' cannot contain whitespace, '/' or ','"
        ));
    }

    Ok(())
}

/// Validate a policy document and return it in compact form
/// Must be a JSON object with a `Statement` entry
pub fn normalize_policy_document(document: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(document)
        .map_err(|e| anyhow::anyhow!("policy is not valid JSON: {e}"))?;

    let object = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("policy must be a JSON object"))?;

    if !object.contains_key("Statement") {
        return Err(anyhow::anyhow!("policy must contain a Statement"));
    }

    Ok(serde_json::to_string(&value)?)
}

/// Validate lifecycle rules
/// At least one rule; ids unique, non-empty and at most 255 characters; every rule
/// carries at least one action; day counts positive; dates parseable
pub fn validate_lifecycle_rules(rules: &[LifecycleRule]) -> Result<()> {
    if rules.is_empty() {
        return Err(anyhow::anyhow!("rules must contain at least one rule"));
    }

    let mut seen = HashSet::new();
    for rule in rules {
        let id = rule.id.trim();
        if id.is_empty() {
            return Err(anyhow::anyhow!("rules[].id cannot be empty"));
        }
        if id.len() > 255 {
            return Err(anyhow::anyhow!(
                "rule id '{id}' exceeds maximum length of 255 characters"
            ));
        }
        if !seen.insert(id) {
            return Err(anyhow::anyhow!("rule id '{id}' is used more than once"));
        }

        let has_action = rule.expiration.is_some()
            || rule.noncurrent_version_expiration.is_some()
            || rule.abort_incomplete_multipart_upload.is_some()
            || !rule.transitions.is_empty()
            || !rule.noncurrent_version_transitions.is_empty();
        if !has_action {
            return Err(anyhow::anyhow!("rule '{id}' has no action"));
        }

        if let Some(expiration) = &rule.expiration {
            validate_days(expiration.days, id)?;
            if let Some(date) = &expiration.date {
                parse_rule_date(date).map_err(|e| anyhow::anyhow!("rule '{id}': {e}"))?;
            }
        }
        if let Some(noncurrent) = &rule.noncurrent_version_expiration {
            validate_days(Some(noncurrent.noncurrent_days), id)?;
        }
        if let Some(abort) = &rule.abort_incomplete_multipart_upload {
            validate_days(Some(abort.days_after_initiation), id)?;
        }
        for transition in &rule.transitions {
            validate_days(transition.days, id)?;
            if transition.storage_class.trim().is_empty() {
                return Err(anyhow::anyhow!("rule '{id}': transition storageClass cannot be empty"));
            }
            if let Some(date) = &transition.date {
                parse_rule_date(date).map_err(|e| anyhow::anyhow!("rule '{id}': {e}"))?;
            }
        }
        for transition in &rule.noncurrent_version_transitions {
            validate_days(Some(transition.noncurrent_days), id)?;
        }
    }

    Ok(())
}

fn validate_days(days: Option<i32>, rule_id: &str) -> Result<()> {
    match days {
        Some(d) if d <= 0 => Err(anyhow::anyhow!(
            "rule '{rule_id}': day counts must be greater than 0, got {d}"
        )),
        _ => Ok(()),
    }
}

/// Parse a lifecycle date given as `YYYY-MM-DD` or RFC3339; returns seconds since epoch
pub fn parse_rule_date(date: &str) -> Result<i64> {
    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(date) {
        return Ok(at.timestamp());
    }
    let day = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{date}': {e}"))?;
    day.and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc().timestamp())
        .ok_or_else(|| anyhow::anyhow!("invalid date '{date}'"))
}
