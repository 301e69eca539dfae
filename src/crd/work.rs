//! # ManifestWork
//!
//! The deployable unit: an ordered list of raw manifests applied on a cluster
//! by the work agent, which reports back through the status.

use crate::crd::condition::Condition;
use kube::core::{ApiResource, GroupVersionKind};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    group = "work.open-cluster-management.io",
    version = "v1",
    kind = "ManifestWork",
    namespaced,
    status = "ManifestWorkStatus",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default)]
    pub workload: ManifestsTemplate,
    /// Per-manifest options (update strategy, status feedback rules)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifest_configs: Vec<ManifestConfigOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestsTemplate {
    #[serde(default)]
    pub manifests: Vec<serde_json::Value>,
}

/// Identifies a single resource carried by a ManifestWork
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    #[serde(default)]
    pub group: String,
    pub resource: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl ResourceIdentifier {
    pub fn new(group: &str, resource: &str, namespace: &str, name: &str) -> Self {
        Self {
            group: group.to_string(),
            resource: resource.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// Identifier of a raw manifest, derived from its apiVersion, kind and metadata
    pub fn for_manifest(manifest: &serde_json::Value) -> Option<Self> {
        let api_version = manifest.get("apiVersion")?.as_str()?;
        let kind = manifest.get("kind")?.as_str()?;
        let metadata = manifest.get("metadata")?;
        let name = metadata.get("name")?.as_str()?;
        let namespace = metadata
            .get("namespace")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let (group, version) = api_version.rsplit_once('/').unwrap_or(("", api_version));
        let gvk = GroupVersionKind::gvk(group, version, kind);
        let resource = ApiResource::from_gvk(&gvk).plural;
        Some(Self::new(group, &resource, namespace, name))
    }

    /// Whether the manifest status entry refers to this resource
    #[must_use]
    pub fn matches_meta(&self, meta: &ManifestResourceMeta) -> bool {
        self.group == meta.group
            && self.resource == meta.resource
            && self.name == meta.name
            && self.namespace == meta.namespace
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfigOption {
    pub resource_identifier: ResourceIdentifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback_rules: Vec<FeedbackRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<UpdateStrategy>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRule {
    pub r#type: FeedbackRuleType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_paths: Vec<JsonPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum FeedbackRuleType {
    WellKnownStatus,
    JSONPaths,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JsonPath {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategy {
    pub r#type: UpdateStrategyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_side_apply: Option<ServerSideApplyConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum UpdateStrategyType {
    Update,
    CreateOnly,
    ServerSideApply,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerSideApplyConfig {
    #[serde(default)]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub resource_status: ManifestResourceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResourceStatus {
    #[serde(default)]
    pub manifests: Vec<ManifestCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCondition {
    pub resource_meta: ManifestResourceMeta,
    #[serde(default)]
    pub status_feedback: StatusFeedbackResult,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResourceMeta {
    #[serde(default)]
    pub ordinal: i32,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusFeedbackResult {
    #[serde(default)]
    pub values: Vec<FeedbackValue>,
}

impl StatusFeedbackResult {
    /// Value reported for a feedback field, if any
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .map(|v| &v.field_value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackValue {
    pub name: String,
    pub field_value: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    #[serde(default)]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_raw: Option<String>,
}

impl ManifestWork {
    /// Conditions reported by the work agent
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Per-manifest status reported by the work agent
    #[must_use]
    pub fn manifest_conditions(&self) -> &[ManifestCondition] {
        self.status
            .as_ref()
            .map(|s| s.resource_status.manifests.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_uses_kubernetes_plurals() {
        let plural = |api_version: &str, kind: &str| {
            let manifest = json!({"apiVersion": api_version, "kind": kind, "metadata": {"name": "x"}});
            ResourceIdentifier::for_manifest(&manifest).unwrap().resource
        };
        assert_eq!(plural("apps/v1", "Deployment"), "deployments");
        assert_eq!(plural("policy.open-cluster-management.io/v1", "Policy"), "policies");
        assert_eq!(plural("networking.k8s.io/v1", "Ingress"), "ingresses");
        assert_eq!(plural("v1", "Endpoints"), "endpoints");
        assert_eq!(plural("metrics.k8s.io/v1beta1", "NodeMetrics"), "nodes");
        assert_eq!(plural("batch/v1", "Job"), "jobs");
    }

    #[test]
    fn test_identifier_for_manifest() {
        let manifest = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "agent", "namespace": "open-cluster-management-agent-addon"}
        });
        let id = ResourceIdentifier::for_manifest(&manifest).unwrap();
        assert_eq!(
            id,
            ResourceIdentifier::new(
                "apps",
                "deployments",
                "open-cluster-management-agent-addon",
                "agent"
            )
        );

        let core = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "c"}});
        let id = ResourceIdentifier::for_manifest(&core).unwrap();
        assert_eq!(id.group, "");
        assert_eq!(id.resource, "configmaps");
        assert_eq!(id.namespace, "");

        assert!(ResourceIdentifier::for_manifest(&json!({"kind": "Pod"})).is_none());
    }

    #[test]
    fn test_work_status_deserializes_feedback() {
        let status: ManifestWorkStatus = serde_json::from_value(json!({
            "conditions": [{"type": "Applied", "status": "True", "reason": "AppliedManifestWorkComplete", "message": ""}],
            "resourceStatus": {"manifests": [{
                "resourceMeta": {"ordinal": 0, "group": "batch", "version": "v1", "kind": "Job", "resource": "jobs", "name": "cleanup", "namespace": "ns"},
                "statusFeedback": {"values": [{"name": "JobComplete", "fieldValue": {"type": "String", "string": "True"}}]},
                "conditions": []
            }]}
        }))
        .unwrap();
        let manifest = &status.resource_status.manifests[0];
        assert_eq!(manifest.resource_meta.kind, "Job");
        assert_eq!(
            manifest
                .status_feedback
                .value("JobComplete")
                .and_then(|v| v.string.as_deref()),
            Some("True")
        );
    }
}
