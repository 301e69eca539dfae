//! # Work Applier
//!
//! Idempotent create-or-update and delete of a single ManifestWork.
//!
//! Reads come from the work cache, so applying an unchanged work costs no API
//! call. Updates are merge patches pinned to the cached `resourceVersion`; a
//! concurrent writer turns into a 409 conflict instead of a lost update.

use crate::constants::{
    REASON_MANIFESTS_APPLIED, REASON_MANIFESTS_APPLY_FAILED, REASON_WORK_APPLY_FAILED,
    WORK_APPLIED,
};
use crate::controller::addon_deploy::error::{is_not_found, DeployError};
use crate::controller::addon_deploy::patch::{create_merge_patch, is_empty_patch};
use crate::controller::addon_deploy::store::{WorkClient, WorkIndex};
use crate::crd::condition::find_status_condition;
use crate::crd::{Condition, ConditionStatus, ManagedClusterAddOn, ManifestWork};
use crate::observability::metrics;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct WorkApplier {
    client: Arc<dyn WorkClient>,
    cache: Arc<dyn WorkIndex>,
}

impl std::fmt::Debug for WorkApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkApplier").finish_non_exhaustive()
    }
}

impl WorkApplier {
    pub fn new(client: Arc<dyn WorkClient>, cache: Arc<dyn WorkIndex>) -> Self {
        Self { client, cache }
    }

    /// Create `required` if absent, patch it if it drifted, otherwise return
    /// the cached copy untouched.
    pub async fn apply(&self, required: ManifestWork) -> Result<ManifestWork, kube::Error> {
        let namespace = required.metadata.namespace.clone().unwrap_or_default();
        let name = required.metadata.name.clone().unwrap_or_default();

        let Some(existing) = self.cache.get(&namespace, &name) else {
            let created = self.client.create(&required).await?;
            info!(work.namespace = %namespace, work.name = %name, "created manifestwork");
            metrics::increment_works_applied("create");
            return Ok(created);
        };

        if work_equal(&existing, &required) {
            debug!(work.namespace = %namespace, work.name = %name, "manifestwork unchanged");
            return Ok(existing.as_ref().clone());
        }

        let patch = work_patch(&existing, &required);
        let updated = self.client.patch(&namespace, &name, &patch).await?;
        info!(work.namespace = %namespace, work.name = %name, "patched manifestwork");
        metrics::increment_works_applied("update");
        Ok(updated)
    }

    /// Delete a work; a work that is already gone counts as deleted.
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        match self.client.delete(namespace, name).await {
            Ok(()) => {
                info!(work.namespace = %namespace, work.name = %name, "deleted manifestwork");
                metrics::increment_works_deleted();
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Apply a work and fold the outcome into `applied_type` on the addon.
    ///
    /// An API error sets the condition False. On success the work's own
    /// `Applied` condition, reported by the agent, decides: absent or Unknown
    /// leaves the addon condition alone, True sets it True, anything else False.
    pub async fn apply_work(
        &self,
        applied_type: &str,
        work: ManifestWork,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<ManifestWork, DeployError> {
        let work = match self.apply(work).await {
            Ok(work) => work,
            Err(e) => {
                addon.set_condition(Condition::new(
                    applied_type,
                    ConditionStatus::False,
                    REASON_WORK_APPLY_FAILED,
                    format!("failed to apply manifestWork: {e}"),
                ));
                return Err(e.into());
            }
        };

        match find_status_condition(work.conditions(), WORK_APPLIED).map(|c| c.status) {
            None | Some(ConditionStatus::Unknown) => {}
            Some(ConditionStatus::True) => {
                addon.set_condition(Condition::new(
                    applied_type,
                    ConditionStatus::True,
                    REASON_MANIFESTS_APPLIED,
                    "manifests of addon are applied successfully",
                ));
            }
            Some(ConditionStatus::False) => {
                addon.set_condition(Condition::new(
                    applied_type,
                    ConditionStatus::False,
                    REASON_MANIFESTS_APPLY_FAILED,
                    "failed to apply the manifests of addon",
                ));
            }
        }
        Ok(work)
    }
}

/// Spec, labels and annotations are all this controller owns on a work
fn work_equal(existing: &ManifestWork, required: &ManifestWork) -> bool {
    existing.spec == required.spec
        && owned_map_equal(&existing.metadata.labels, &required.metadata.labels)
        && owned_map_equal(&existing.metadata.annotations, &required.metadata.annotations)
}

/// Every required entry is present with the same value; extra entries set by others are kept
fn owned_map_equal(
    existing: &Option<BTreeMap<String, String>>,
    required: &Option<BTreeMap<String, String>>,
) -> bool {
    let Some(required) = required else {
        return true;
    };
    let existing = existing.as_ref();
    required
        .iter()
        .all(|(k, v)| existing.and_then(|e| e.get(k)) == Some(v))
}

fn work_patch(existing: &ManifestWork, required: &ManifestWork) -> Value {
    let old = json!({
        "metadata": {
            "labels": existing.metadata.labels,
            "annotations": existing.metadata.annotations,
        },
        "spec": existing.spec,
    });
    let new = json!({
        "metadata": {
            "labels": merged_map(&existing.metadata.labels, &required.metadata.labels),
            "annotations": merged_map(&existing.metadata.annotations, &required.metadata.annotations),
        },
        "spec": required.spec,
    });
    let mut patch = create_merge_patch(&old, &new);
    if is_empty_patch(&patch) {
        return patch;
    }
    if let Some(Value::Object(meta)) = patch
        .as_object_mut()
        .map(|p| p.entry("metadata").or_insert_with(|| json!({})))
    {
        if let Some(uid) = &existing.metadata.uid {
            meta.insert("uid".to_string(), json!(uid));
        }
        if let Some(rv) = &existing.metadata.resource_version {
            meta.insert("resourceVersion".to_string(), json!(rv));
        }
    }
    patch
}

/// Required entries layered over the existing ones
fn merged_map(
    existing: &Option<BTreeMap<String, String>>,
    required: &Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    match (existing, required) {
        (None, None) => None,
        _ => {
            let mut merged = existing.clone().unwrap_or_default();
            merged.extend(required.clone().unwrap_or_default());
            Some(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ManifestWorkSpec, ManifestsTemplate};

    fn work(manifests: Vec<Value>, labels: &[(&str, &str)]) -> ManifestWork {
        let mut work = ManifestWork::new(
            "addon-foo-deploy-0",
            ManifestWorkSpec {
                workload: ManifestsTemplate { manifests },
                manifest_configs: Vec::new(),
            },
        );
        work.metadata.namespace = Some("cluster1".to_string());
        work.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        work
    }

    #[test]
    fn test_equal_ignores_foreign_labels() {
        let mut existing = work(vec![json!({"kind": "A"})], &[("a", "1"), ("other", "x")]);
        existing.metadata.resource_version = Some("3".to_string());
        let required = work(vec![json!({"kind": "A"})], &[("a", "1")]);
        assert!(work_equal(&existing, &required));
    }

    #[test]
    fn test_spec_change_is_detected() {
        let existing = work(vec![json!({"kind": "A"})], &[("a", "1")]);
        let required = work(vec![json!({"kind": "B"})], &[("a", "1")]);
        assert!(!work_equal(&existing, &required));
    }

    #[test]
    fn test_patch_carries_resource_version_and_new_spec() {
        let mut existing = work(vec![json!({"kind": "A"})], &[("a", "1")]);
        existing.metadata.resource_version = Some("42".to_string());
        existing.metadata.uid = Some("uid-1".to_string());
        let required = work(vec![json!({"kind": "B"})], &[("a", "1"), ("b", "2")]);

        let patch = work_patch(&existing, &required);
        assert_eq!(patch["metadata"]["resourceVersion"], "42");
        assert_eq!(patch["metadata"]["uid"], "uid-1");
        assert_eq!(patch["metadata"]["labels"], json!({"b": "2"}));

        let mut doc = serde_json::to_value(&existing).unwrap();
        json_patch::merge(&mut doc, &patch);
        assert_eq!(doc["spec"]["workload"]["manifests"], json!([{"kind": "B"}]));
        assert_eq!(doc["metadata"]["labels"], json!({"a": "1", "b": "2"}));
    }
}
