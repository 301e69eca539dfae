//! # Health Probing
//!
//! How an addon's availability is decided. Lease-based addons report health
//! through their agent; work-probed addons are judged from the status
//! feedback the work agent reports for selected resources.

use crate::crd::{FeedbackRule, FeedbackRuleType, JsonPath, ResourceIdentifier, StatusFeedbackResult};
use anyhow::{anyhow, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum HealthProber {
    /// The agent keeps a lease on the hub
    Lease,
    /// Health is managed elsewhere
    None,
    /// Health is derived from ManifestWork feedback; without a prober the
    /// addon counts as available once its works are applied
    Work(Option<WorkHealthProber>),
}

#[derive(Debug, Clone)]
pub struct WorkHealthProber {
    pub probe_fields: Vec<ProbeField>,
    pub checker: Arc<dyn HealthChecker>,
}

/// One resource whose status feedback feeds the health check
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeField {
    pub resource_identifier: ResourceIdentifier,
    /// JSON paths to collect; empty means the well-known status of the kind
    pub probe_rules: Vec<JsonPath>,
}

impl ProbeField {
    #[must_use]
    pub fn well_known(resource_identifier: ResourceIdentifier) -> Self {
        Self {
            resource_identifier,
            probe_rules: Vec::new(),
        }
    }

    /// Feedback rules the work agent needs to report this field
    #[must_use]
    pub fn feedback_rules(&self) -> Vec<FeedbackRule> {
        if self.probe_rules.is_empty() {
            return vec![FeedbackRule {
                r#type: FeedbackRuleType::WellKnownStatus,
                json_paths: Vec::new(),
            }];
        }
        vec![FeedbackRule {
            r#type: FeedbackRuleType::JSONPaths,
            json_paths: self.probe_rules.clone(),
        }]
    }
}

/// Decides whether a probed resource is healthy
pub trait HealthChecker: Send + Sync + std::fmt::Debug {
    fn check(&self, identifier: &ResourceIdentifier, feedback: &StatusFeedbackResult) -> Result<()>;
}

/// Healthy when a deployment reports at least one ready replica
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentAvailabilityChecker;

impl HealthChecker for DeploymentAvailabilityChecker {
    fn check(&self, identifier: &ResourceIdentifier, feedback: &StatusFeedbackResult) -> Result<()> {
        if identifier.resource != "deployments" {
            return Err(anyhow!(
                "unsupported resource type {}/{}",
                identifier.group,
                identifier.resource
            ));
        }
        let ready = feedback
            .value("ReadyReplicas")
            .and_then(|v| v.integer)
            .ok_or_else(|| {
                anyhow!(
                    "readyReplicas is not probed for deployment {}/{}",
                    identifier.namespace,
                    identifier.name
                )
            })?;
        if ready > 0 {
            return Ok(());
        }
        Err(anyhow!(
            "readyReplicas is {ready} for deployment {}/{}",
            identifier.namespace,
            identifier.name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{FeedbackValue, FieldValue};

    fn feedback(ready: Option<i64>) -> StatusFeedbackResult {
        StatusFeedbackResult {
            values: ready
                .map(|r| FeedbackValue {
                    name: "ReadyReplicas".to_string(),
                    field_value: FieldValue {
                        r#type: "Integer".to_string(),
                        integer: Some(r),
                        ..FieldValue::default()
                    },
                })
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_deployment_availability() {
        let id = ResourceIdentifier::new("apps", "deployments", "ns", "agent");
        let checker = DeploymentAvailabilityChecker;
        assert!(checker.check(&id, &feedback(Some(1))).is_ok());
        assert!(checker.check(&id, &feedback(Some(0))).is_err());
        assert!(checker.check(&id, &feedback(None)).is_err());

        let not_deployment = ResourceIdentifier::new("", "configmaps", "ns", "agent");
        assert!(checker.check(&not_deployment, &feedback(Some(1))).is_err());
    }

    #[test]
    fn test_probe_field_rules() {
        let id = ResourceIdentifier::new("apps", "deployments", "ns", "agent");
        let well_known = ProbeField::well_known(id.clone());
        assert_eq!(well_known.feedback_rules()[0].r#type, FeedbackRuleType::WellKnownStatus);

        let custom = ProbeField {
            resource_identifier: id,
            probe_rules: vec![JsonPath {
                name: "replicas".to_string(),
                version: None,
                path: ".status.replicas".to_string(),
            }],
        };
        let rules = custom.feedback_rules();
        assert_eq!(rules[0].r#type, FeedbackRuleType::JSONPaths);
        assert_eq!(rules[0].json_paths.len(), 1);
    }
}
