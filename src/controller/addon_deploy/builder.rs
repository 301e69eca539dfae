//! # Work Builder
//!
//! Turns the manifests an addon wants into size-bounded ManifestWorks and
//! diffs them against the works that already exist.
//!
//! Building is pure: nothing here talks to the API server. The caller applies
//! `to_apply` and deletes `to_delete`.

use crate::constants::{ADDON_LABEL_KEY, ADDON_NAMESPACE_LABEL_KEY};
use crate::controller::addon_deploy::error::BuildError;
use crate::controller::addon_deploy::mode::{
    deploy_work_name, hook_work_name, hosted_mode_info, is_deployable, is_pre_delete_hook,
    InstallMode,
};
use crate::crd::{
    FeedbackRule, FeedbackRuleType, ManagedCluster, ManagedClusterAddOn, ManifestConfigOption,
    ManifestWork, ManifestWorkSpec, ManifestsTemplate, ResourceIdentifier,
};
use kube::{Resource, ResourceExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// The manifests an addon provider asked for in one sync.
///
/// Objects marked as pre-delete hooks are split out of the regular workload.
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    pub deploy: Vec<Value>,
    pub hooks: Vec<Value>,
    /// Per-resource options (update strategies, feedback rules)
    pub configs: Vec<ManifestConfigOption>,
}

impl ManifestSet {
    #[must_use]
    pub fn new(objects: Vec<Value>, configs: Vec<ManifestConfigOption>) -> Self {
        let (hooks, deploy) = objects.into_iter().partition(is_pre_delete_hook);
        Self {
            deploy,
            hooks,
            configs,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deploy.is_empty() && self.hooks.is_empty()
    }
}

/// Result of diffing desired works against existing ones
#[derive(Debug, Clone, Default)]
pub struct BuiltWorks {
    /// Works to create or update, in bin order
    pub to_apply: Vec<ManifestWork>,
    /// Existing works no longer backed by any bin
    pub to_delete: Vec<Arc<ManifestWork>>,
}

#[derive(Debug, Clone)]
pub struct WorkBuilder {
    manifest_limit: usize,
    hosted_mode_enabled: bool,
}

impl WorkBuilder {
    #[must_use]
    pub fn new(manifest_limit: usize, hosted_mode_enabled: bool) -> Self {
        Self {
            manifest_limit,
            hosted_mode_enabled,
        }
    }

    /// Build the deploy works for `target` in `work_namespace`.
    ///
    /// Fails with `EmptyManifests` when the provider returned nothing at all
    /// while works are still deployed, so the caller can decide between
    /// "nothing to do" and "tear down".
    pub fn build_deploy_works(
        &self,
        target: InstallMode,
        work_namespace: &str,
        cluster: &ManagedCluster,
        existing: &[Arc<ManifestWork>],
        addon: &ManagedClusterAddOn,
        desired: &ManifestSet,
    ) -> Result<BuiltWorks, BuildError> {
        self.check_namespace(target, work_namespace, cluster)?;
        let info = hosted_mode_info(addon, cluster)?;

        if desired.is_empty() {
            if existing.is_empty() {
                return Ok(BuiltWorks::default());
            }
            return Err(BuildError::EmptyManifests {
                existing: existing.len(),
            });
        }

        let mut deployable = Vec::with_capacity(desired.deploy.len());
        for manifest in &desired.deploy {
            if is_deployable(target, info.mode, self.hosted_mode_enabled, manifest)? {
                deployable.push(manifest);
            }
        }

        let addon_namespace = addon.namespace().unwrap_or_default();
        let addon_name = addon.name_any();
        let mut to_apply = Vec::new();
        for (index, bin) in self.bin_manifests(&deployable)?.into_iter().enumerate() {
            let configs = configs_for(&bin, &desired.configs);
            let name = deploy_work_name(target, &addon_namespace, &addon_name, index);
            to_apply.push(new_work(&name, work_namespace, addon, bin, configs));
        }

        let wanted: HashSet<&str> = to_apply
            .iter()
            .filter_map(|w| w.metadata.name.as_deref())
            .collect();
        let to_delete = existing
            .iter()
            .filter(|w| !w.metadata.name.as_deref().is_some_and(|n| wanted.contains(n)))
            .cloned()
            .collect();

        Ok(BuiltWorks {
            to_apply,
            to_delete,
        })
    }

    /// Build the single pre-delete hook work for `target`, if the addon has hooks.
    pub fn build_hook_work(
        &self,
        target: InstallMode,
        work_namespace: &str,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
        desired: &ManifestSet,
    ) -> Result<Option<ManifestWork>, BuildError> {
        self.check_namespace(target, work_namespace, cluster)?;
        let info = hosted_mode_info(addon, cluster)?;

        let mut hooks = Vec::new();
        let mut size = 0;
        for manifest in &desired.hooks {
            if is_deployable(target, info.mode, self.hosted_mode_enabled, manifest)? {
                size += serde_json::to_vec(manifest)?.len();
                hooks.push(manifest.clone());
            }
        }
        if hooks.is_empty() {
            return Ok(None);
        }
        if size > self.manifest_limit {
            return Err(BuildError::HookTooLarge {
                size,
                limit: self.manifest_limit,
            });
        }

        let mut configs = configs_for(&hooks, &desired.configs);
        for manifest in &hooks {
            let kind = manifest.get("kind").and_then(Value::as_str);
            if !matches!(kind, Some("Job" | "Pod")) {
                continue;
            }
            let Some(id) = ResourceIdentifier::for_manifest(manifest) else {
                continue;
            };
            add_well_known_status_rule(&mut configs, id);
        }

        let addon_namespace = addon.namespace().unwrap_or_default();
        let name = hook_work_name(target, &addon_namespace, &addon.name_any());
        Ok(Some(new_work(&name, work_namespace, addon, hooks, configs)))
    }

    fn check_namespace(
        &self,
        target: InstallMode,
        work_namespace: &str,
        cluster: &ManagedCluster,
    ) -> Result<(), BuildError> {
        let cluster_name = cluster.name_any();
        if target == InstallMode::Default && work_namespace != cluster_name {
            return Err(BuildError::NamespaceMismatch {
                namespace: work_namespace.to_string(),
                cluster: cluster_name,
            });
        }
        Ok(())
    }

    /// Greedy, order-preserving split into bins of at most `manifest_limit` serialized bytes
    fn bin_manifests(&self, manifests: &[&Value]) -> Result<Vec<Vec<Value>>, BuildError> {
        let mut bins = Vec::new();
        let mut current: Vec<Value> = Vec::new();
        let mut current_size = 0;
        for (index, manifest) in manifests.iter().enumerate() {
            let size = serde_json::to_vec(manifest)?.len();
            if size > self.manifest_limit {
                return Err(BuildError::ManifestTooLarge {
                    index,
                    size,
                    limit: self.manifest_limit,
                });
            }
            if !current.is_empty() && current_size + size > self.manifest_limit {
                bins.push(std::mem::take(&mut current));
                current_size = 0;
            }
            current.push((*manifest).clone());
            current_size += size;
        }
        if !current.is_empty() {
            bins.push(current);
        }
        Ok(bins)
    }
}

/// Options whose resource is carried by one of `manifests`
fn configs_for(manifests: &[Value], configs: &[ManifestConfigOption]) -> Vec<ManifestConfigOption> {
    if configs.is_empty() {
        return Vec::new();
    }
    let ids: HashSet<ResourceIdentifier> = manifests
        .iter()
        .filter_map(ResourceIdentifier::for_manifest)
        .collect();
    configs
        .iter()
        .filter(|c| ids.contains(&c.resource_identifier))
        .cloned()
        .collect()
}

fn add_well_known_status_rule(configs: &mut Vec<ManifestConfigOption>, id: ResourceIdentifier) {
    let rule = FeedbackRule {
        r#type: FeedbackRuleType::WellKnownStatus,
        json_paths: Vec::new(),
    };
    match configs.iter_mut().find(|c| c.resource_identifier == id) {
        Some(config) => {
            if !config.feedback_rules.contains(&rule) {
                config.feedback_rules.push(rule);
            }
        }
        None => configs.push(ManifestConfigOption {
            resource_identifier: id,
            feedback_rules: vec![rule],
            update_strategy: None,
        }),
    }
}

fn new_work(
    name: &str,
    work_namespace: &str,
    addon: &ManagedClusterAddOn,
    manifests: Vec<Value>,
    manifest_configs: Vec<ManifestConfigOption>,
) -> ManifestWork {
    let addon_namespace = addon.namespace().unwrap_or_default();
    let mut labels = BTreeMap::from([(ADDON_LABEL_KEY.to_string(), addon.name_any())]);
    if work_namespace != addon_namespace {
        labels.insert(ADDON_NAMESPACE_LABEL_KEY.to_string(), addon_namespace.clone());
    }

    let mut work = ManifestWork::new(
        name,
        ManifestWorkSpec {
            workload: ManifestsTemplate { manifests },
            manifest_configs,
        },
    );
    work.metadata.namespace = Some(work_namespace.to_string());
    work.metadata.labels = Some(labels);
    // Owner references cannot cross namespaces.
    if work_namespace == addon_namespace {
        work.metadata.owner_references = addon.controller_owner_ref(&()).map(|o| vec![o]);
    }
    work
}
