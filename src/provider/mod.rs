//! # Addon Providers
//!
//! An addon provider decides which manifests an addon should run on a given
//! cluster. The deploy engine only consumes its output.
//!
//! Each provider implements `AgentAddon`:
//! - `manifests` returns the objects to deploy, recomputed on every sync
//! - `options` declares hosted-mode support, health probing and per-resource update strategies

use crate::crd::{
    ManagedCluster, ManagedClusterAddOn, ManifestConfigOption, ResourceIdentifier, UpdateStrategy,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod directory;
pub mod health;

pub use directory::DirectoryManifestAddon;
pub use health::{
    DeploymentAvailabilityChecker, HealthChecker, HealthProber, ProbeField, WorkHealthProber,
};

/// Provider trait for addon agents
#[async_trait]
pub trait AgentAddon: Send + Sync {
    /// Objects the addon should run on `cluster`
    async fn manifests(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Vec<serde_json::Value>>;

    /// Static options of the addon
    fn options(&self) -> AgentAddonOptions;
}

/// Options declared by an addon provider
#[derive(Debug, Clone, Default)]
pub struct AgentAddonOptions {
    /// Name of the ManagedClusterAddOn this provider serves
    pub addon_name: String,
    /// Whether the agent can run on a hosting cluster
    pub hosted_mode_enabled: bool,
    /// How addon health is determined; `None` leaves health alone
    pub health_prober: Option<HealthProber>,
    /// Per-resource update strategies
    pub updaters: Vec<Updater>,
}

/// Update strategy for one resource shipped by the addon
#[derive(Debug, Clone, PartialEq)]
pub struct Updater {
    pub resource_identifier: ResourceIdentifier,
    pub update_strategy: UpdateStrategy,
}

impl AgentAddonOptions {
    /// Manifest-level options for the works: update strategies merged with
    /// the feedback rules the work health prober needs.
    #[must_use]
    pub fn manifest_configs(&self) -> Vec<ManifestConfigOption> {
        let mut configs: Vec<ManifestConfigOption> = self
            .updaters
            .iter()
            .map(|u| ManifestConfigOption {
                resource_identifier: u.resource_identifier.clone(),
                feedback_rules: Vec::new(),
                update_strategy: Some(u.update_strategy.clone()),
            })
            .collect();

        let Some(HealthProber::Work(Some(prober))) = &self.health_prober else {
            return configs;
        };
        for field in &prober.probe_fields {
            let rules = field.feedback_rules();
            match configs
                .iter_mut()
                .find(|c| c.resource_identifier == field.resource_identifier)
            {
                Some(config) => config.feedback_rules.extend(rules),
                None => configs.push(ManifestConfigOption {
                    resource_identifier: field.resource_identifier.clone(),
                    feedback_rules: rules,
                    update_strategy: None,
                }),
            }
        }
        configs
    }
}

/// Registered providers by addon name
#[derive(Clone, Default)]
pub struct AddonRegistry {
    addons: BTreeMap<String, Arc<dyn AgentAddon>>,
}

impl std::fmt::Debug for AddonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonRegistry")
            .field("addons", &self.addons.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AddonRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the addon name it declares. A later
    /// registration for the same name replaces the earlier one.
    pub fn register(&mut self, addon: Arc<dyn AgentAddon>) {
        let name = addon.options().addon_name;
        self.addons.insert(name, addon);
    }

    #[must_use]
    pub fn get(&self, addon_name: &str) -> Option<Arc<dyn AgentAddon>> {
        self.addons.get(addon_name).cloned()
    }

    #[must_use]
    pub fn contains(&self, addon_name: &str) -> bool {
        self.addons.contains_key(addon_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.addons.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{FeedbackRuleType, UpdateStrategyType};

    struct Static(&'static str);

    #[async_trait]
    impl AgentAddon for Static {
        async fn manifests(
            &self,
            _cluster: &ManagedCluster,
            _addon: &ManagedClusterAddOn,
        ) -> Result<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }

        fn options(&self) -> AgentAddonOptions {
            AgentAddonOptions {
                addon_name: self.0.to_string(),
                ..AgentAddonOptions::default()
            }
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = AddonRegistry::new();
        registry.register(Arc::new(Static("foo")));
        registry.register(Arc::new(Static("bar")));
        assert!(registry.contains("foo"));
        assert!(registry.get("baz").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), ["bar", "foo"]);
    }

    #[test]
    fn test_manifest_configs_merge_updaters_and_probes() {
        let deployment = ResourceIdentifier::new("apps", "deployments", "agent-ns", "agent");
        let options = AgentAddonOptions {
            addon_name: "foo".to_string(),
            updaters: vec![Updater {
                resource_identifier: deployment.clone(),
                update_strategy: UpdateStrategy {
                    r#type: UpdateStrategyType::ServerSideApply,
                    server_side_apply: None,
                },
            }],
            health_prober: Some(HealthProber::Work(Some(WorkHealthProber {
                probe_fields: vec![ProbeField::well_known(deployment.clone())],
                checker: Arc::new(DeploymentAvailabilityChecker),
            }))),
            ..AgentAddonOptions::default()
        };
        let configs = options.manifest_configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].resource_identifier, deployment);
        assert!(configs[0].update_strategy.is_some());
        assert_eq!(
            configs[0].feedback_rules[0].r#type,
            FeedbackRuleType::WellKnownStatus
        );
    }
}
