//! # Sync Dispatcher
//!
//! Per-key entry point of the engine. Resolves the addon, its provider and its
//! cluster, runs the syncer chain on a copy of the addon and hands the result
//! to the `StatusReconciler`.

use crate::constants::CONDITION_REGISTRATION_APPLIED;
use crate::controller::addon_deploy::applier::WorkApplier;
use crate::controller::addon_deploy::error::DeployError;
use crate::controller::addon_deploy::key::AddonKey;
use crate::controller::addon_deploy::status::StatusReconciler;
use crate::controller::addon_deploy::store::{AddonClient, HubLister, WorkClient, WorkIndex};
use crate::controller::addon_deploy::syncers::{
    AddonDeploySyncer, DefaultHookSyncer, DefaultSyncer, HealthCheckSyncer, HostedHookSyncer,
    HostedSyncer,
};
use crate::controller::addon_deploy::works::WorkDeployer;
use crate::crd::condition::find_status_condition;
use crate::observability::metrics;
use crate::provider::{AddonRegistry, AgentAddon};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// The addon deploy engine
pub struct AddonDeployController {
    registry: AddonRegistry,
    hub: Arc<dyn HubLister>,
    works: Arc<dyn WorkIndex>,
    applier: Arc<WorkApplier>,
    status: StatusReconciler,
    manifest_limit: usize,
}

impl std::fmt::Debug for AddonDeployController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonDeployController")
            .field("registry", &self.registry)
            .field("manifest_limit", &self.manifest_limit)
            .finish_non_exhaustive()
    }
}

impl AddonDeployController {
    pub fn new(
        registry: AddonRegistry,
        hub: Arc<dyn HubLister>,
        works: Arc<dyn WorkIndex>,
        work_client: Arc<dyn WorkClient>,
        addon_client: Arc<dyn AddonClient>,
        manifest_limit: usize,
    ) -> Self {
        let applier = Arc::new(WorkApplier::new(work_client, Arc::clone(&works)));
        Self {
            registry,
            hub,
            works,
            applier,
            status: StatusReconciler::new(addon_client),
            manifest_limit,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &AddonRegistry {
        &self.registry
    }

    /// The syncer chain for one addon, in execution order
    fn syncers(&self, agent: Arc<dyn AgentAddon>) -> Vec<Box<dyn AddonDeploySyncer>> {
        let deployer = Arc::new(WorkDeployer::new(
            agent,
            Arc::clone(&self.applier),
            self.manifest_limit,
        ));
        vec![
            Box::new(DefaultSyncer::new(Arc::clone(&deployer), Arc::clone(&self.works))),
            Box::new(HostedSyncer::new(
                Arc::clone(&deployer),
                Arc::clone(&self.works),
                Arc::clone(&self.hub),
            )),
            Box::new(DefaultHookSyncer::new(Arc::clone(&deployer))),
            Box::new(HostedHookSyncer::new(
                Arc::clone(&deployer),
                Arc::clone(&self.works),
                Arc::clone(&self.hub),
            )),
            Box::new(HealthCheckSyncer::new(
                deployer.options().clone(),
                Arc::clone(&self.works),
            )),
        ]
    }

    /// Sync the addon behind a `cluster/addon` queue key.
    ///
    /// Malformed keys, unregistered addons and missing objects are no-ops.
    pub async fn sync(&self, key: &str) -> Result<(), DeployError> {
        let Some(key) = AddonKey::parse(key) else {
            debug!(key, "ignoring malformed addon key");
            return Ok(());
        };
        let span = info_span!(
            "addon_deploy.sync",
            cluster = %key.cluster,
            addon = %key.addon
        );
        let start = Instant::now();
        metrics::increment_syncs();
        let result = self.sync_addon(&key).instrument(span).await;
        metrics::observe_sync_duration(start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_sync_errors();
        }
        result
    }

    async fn sync_addon(&self, key: &AddonKey) -> Result<(), DeployError> {
        let Some(agent) = self.registry.get(&key.addon) else {
            return Ok(());
        };

        let Some(addon) = self.hub.get_addon(&key.cluster, &key.addon)? else {
            debug!("addon not found");
            return Ok(());
        };

        // Deploy only after registration has been applied
        if find_status_condition(addon.conditions(), CONDITION_REGISTRATION_APPLIED).is_none() {
            debug!("addon registration not applied yet");
            return Ok(());
        }

        let Some(cluster) = self.hub.get_cluster(&key.cluster)? else {
            debug!("managed cluster not found");
            return Ok(());
        };

        let old = addon.as_ref();
        let mut new = old.clone();
        let mut errors = Vec::new();
        for syncer in self.syncers(agent) {
            if let Err(e) = syncer.sync(&cluster, &mut new).await {
                warn!(syncer = syncer.name(), error = %e, "syncer failed");
                errors.push(e);
            }
        }

        if let Err(e) = self.status.update(&new, old).await {
            errors.push(e);
        }
        DeployError::aggregate(errors)
    }
}
