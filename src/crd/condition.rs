//! # Conditions
//!
//! Status conditions shared by the addon and work resources, with the
//! find/set helpers the syncers use to fold outcomes into status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Condition represents a status condition for the resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Generation of the object the condition was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Last time the status changed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl Condition {
    pub fn new(
        r#type: &str,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: r#type.to_string(),
            status,
            observed_generation: None,
            last_transition_time: None,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

pub fn find_status_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type).is_some_and(Condition::is_true)
}

/// Set a condition, inserting it if absent.
///
/// The transition time only moves when the status changes. Reason, message and
/// observed generation are always overwritten. Returns true if anything changed.
pub fn set_status_condition(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    let now = || {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    };

    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new.r#type) else {
        let mut new = new;
        if new.last_transition_time.is_none() {
            new.last_transition_time = Some(now());
        }
        conditions.push(new);
        return true;
    };

    let mut changed = false;
    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time = Some(new.last_transition_time.unwrap_or_else(now));
        changed = true;
    }
    if existing.reason != new.reason {
        existing.reason = new.reason;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    if existing.observed_generation != new.observed_generation {
        existing.observed_generation = new.observed_generation;
        changed = true;
    }
    changed
}

/// Remove a condition by type. Returns true if one was removed.
pub fn remove_status_condition(conditions: &mut Vec<Condition>, condition_type: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.r#type != condition_type);
    conditions.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_inserts_with_transition_time() {
        let mut conditions = Vec::new();
        let changed = set_status_condition(
            &mut conditions,
            Condition::new("ManifestApplied", ConditionStatus::True, "Applied", "ok"),
        );
        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let mut conditions = vec![Condition {
            last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            ..Condition::new("ManifestApplied", ConditionStatus::True, "Applied", "ok")
        }];
        let changed = set_status_condition(
            &mut conditions,
            Condition::new("ManifestApplied", ConditionStatus::True, "Applied", "ok"),
        );
        assert!(!changed);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_set_condition_moves_transition_time_on_status_change() {
        let mut conditions = vec![Condition {
            last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            ..Condition::new("ManifestApplied", ConditionStatus::True, "Applied", "ok")
        }];
        let changed = set_status_condition(
            &mut conditions,
            Condition::new("ManifestApplied", ConditionStatus::False, "Failed", "boom"),
        );
        assert!(changed);
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, "Failed");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_find_and_remove() {
        let mut conditions = vec![
            Condition::new("A", ConditionStatus::True, "r", "m"),
            Condition::new("B", ConditionStatus::False, "r", "m"),
        ];
        assert!(is_status_condition_true(&conditions, "A"));
        assert!(!is_status_condition_true(&conditions, "B"));
        assert!(!is_status_condition_true(&conditions, "C"));
        assert!(remove_status_condition(&mut conditions, "A"));
        assert!(find_status_condition(&conditions, "A").is_none());
        assert!(!remove_status_condition(&mut conditions, "A"));
    }

    #[test]
    fn test_condition_status_serializes_as_string() {
        let c = Condition::new("A", ConditionStatus::Unknown, "r", "m");
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["status"], "Unknown");
        assert_eq!(v["type"], "A");
        assert!(v.get("observedGeneration").is_none());
    }
}
