//! # Resource Status
//!
//! Status types shared by every resource kind: the condition set, readiness flag,
//! observed generation and last sync time.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Common status block flattened into every kind's status subresource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Whether the last pass converged successfully
    #[serde(default)]
    pub ready: bool,
    /// Conditions represent the latest available observations, at most one per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the spec the controller last acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Time the last pass reached a terminal outcome (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: ConditionType,
    /// Status of the condition
    pub status: ConditionStatus,
    /// Last time `status` changed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    Ready,
    Progressing,
    Degraded,
    Error,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "Ready",
            Self::Progressing => "Progressing",
            Self::Degraded => "Degraded",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

/// Format a timestamp the way every status field stores it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl ResourceStatus {
    /// Look up the condition of the given type
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Whether a condition of the given type exists with status `True`
    pub fn is_condition_true(&self, condition_type: ConditionType) -> bool {
        self.condition(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Upsert a condition.
    ///
    /// The transition time moves only when `status` flips; reason and message are
    /// always overwritten. Conditions are never removed.
    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition_type)
        {
            if existing.status != status {
                existing.status = status;
                existing.last_transition_time = Some(format_timestamp(now));
            }
            existing.reason = Some(reason.to_owned());
            existing.message = Some(message.to_owned());
            return;
        }

        self.conditions.push(Condition {
            r#type: condition_type,
            status,
            last_transition_time: Some(format_timestamp(now)),
            reason: Some(reason.to_owned()),
            message: Some(message.to_owned()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_set_condition_appends_when_absent() {
        let mut status = ResourceStatus::default();
        status.set_condition(
            ConditionType::Ready,
            ConditionStatus::False,
            "Pending",
            "waiting",
            at(0),
        );
        assert_eq!(status.conditions.len(), 1);
        let ready = status.condition(ConditionType::Ready).unwrap();
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.last_transition_time, Some(format_timestamp(at(0))));
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let mut status = ResourceStatus::default();
        status.set_condition(ConditionType::Error, ConditionStatus::True, "A", "first", at(0));
        status.set_condition(ConditionType::Error, ConditionStatus::True, "B", "second", at(30));

        let error = status.condition(ConditionType::Error).unwrap();
        assert_eq!(error.last_transition_time, Some(format_timestamp(at(0))));
        assert_eq!(error.reason.as_deref(), Some("B"));
        assert_eq!(error.message.as_deref(), Some("second"));
        assert_eq!(status.conditions.len(), 1);
    }

    #[test]
    fn test_set_condition_moves_transition_time_on_flip() {
        let mut status = ResourceStatus::default();
        status.set_condition(ConditionType::Ready, ConditionStatus::False, "X", "", at(0));
        status.set_condition(ConditionType::Ready, ConditionStatus::True, "Ready", "", at(10));

        let ready = status.condition(ConditionType::Ready).unwrap();
        assert_eq!(ready.last_transition_time, Some(format_timestamp(at(10))));
        assert!(status.is_condition_true(ConditionType::Ready));
    }

    #[test]
    fn test_condition_serializes_with_kubernetes_casing() {
        let mut status = ResourceStatus::default();
        status.set_condition(ConditionType::Progressing, ConditionStatus::True, "Reconciling", "", at(0));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["conditions"][0]["type"], "Progressing");
        assert_eq!(json["conditions"][0]["status"], "True");
        assert!(json["conditions"][0]["lastTransitionTime"].is_string());
    }
}
