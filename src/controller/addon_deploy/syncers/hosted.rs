use crate::constants::{
    CONDITION_HOSTING_CLUSTER_VALIDITY, HOSTING_MANIFEST_FINALIZER,
    HOSTING_PRE_DELETE_HOOK_FINALIZER, REASON_HOSTING_CLUSTER_INVALID,
    REASON_HOSTING_CLUSTER_VALID,
};
use crate::controller::addon_deploy::error::{BuildError, DeployError};
use crate::controller::addon_deploy::index::WorkIndexName;
use crate::controller::addon_deploy::mode::InstallMode;
use crate::controller::addon_deploy::store::{HubLister, WorkIndex};
use crate::controller::addon_deploy::syncers::AddonDeploySyncer;
use crate::controller::addon_deploy::works::{resolve_hosted_mode, WorkDeployer};
use crate::crd::{Condition, ConditionStatus, ManagedCluster, ManagedClusterAddOn};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Deploys the hosting-located part of the addon into the hosting cluster
/// namespace and tears it down when the addon leaves hosted mode
pub struct HostedSyncer {
    deployer: Arc<WorkDeployer>,
    works: Arc<dyn WorkIndex>,
    hub: Arc<dyn HubLister>,
}

impl std::fmt::Debug for HostedSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedSyncer").finish_non_exhaustive()
    }
}

impl HostedSyncer {
    pub fn new(
        deployer: Arc<WorkDeployer>,
        works: Arc<dyn WorkIndex>,
        hub: Arc<dyn HubLister>,
    ) -> Self {
        Self {
            deployer,
            works,
            hub,
        }
    }

    /// Delete the hosting deploy works, but only once they were guarded by the finalizer
    async fn cleanup(&self, addon: &ManagedClusterAddOn) -> Result<(), DeployError> {
        if !addon.has_finalizer(HOSTING_MANIFEST_FINALIZER) {
            return Ok(());
        }
        let works = self.works.by_index(
            WorkIndexName::ByHostedAddon,
            &addon.namespace().unwrap_or_default(),
            &addon.name_any(),
        )?;
        if !works.is_empty() {
            info!(
                addon.namespace = %addon.namespace().unwrap_or_default(),
                addon.name = %addon.name_any(),
                count = works.len(),
                "cleaning up hosting manifestworks"
            );
        }
        self.deployer.delete_works(&works).await
    }

    async fn cleanup_and_release(&self, addon: &mut ManagedClusterAddOn) -> Result<(), DeployError> {
        self.cleanup(addon).await?;
        addon.remove_finalizer(HOSTING_MANIFEST_FINALIZER);
        Ok(())
    }
}

#[async_trait]
impl AddonDeploySyncer for HostedSyncer {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn sync(
        &self,
        cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<(), DeployError> {
        if !self.deployer.options().hosted_mode_enabled {
            return Ok(());
        }

        let info = resolve_hosted_mode(cluster, addon)?;
        if info.mode != InstallMode::Hosted {
            // Leftovers from a previous hosted installation
            return self.cleanup_and_release(addon).await;
        }

        let hosting_cluster = info.hosting_cluster;
        let Some(hosting) = self.hub.get_cluster(&hosting_cluster)? else {
            self.cleanup(addon).await?;
            addon.set_condition(Condition::new(
                CONDITION_HOSTING_CLUSTER_VALIDITY,
                ConditionStatus::False,
                REASON_HOSTING_CLUSTER_INVALID,
                format!("hosting cluster {hosting_cluster} is not a managed cluster of the hub"),
            ));
            addon.remove_finalizer(HOSTING_MANIFEST_FINALIZER);
            return Ok(());
        };
        addon.set_condition(Condition::new(
            CONDITION_HOSTING_CLUSTER_VALIDITY,
            ConditionStatus::True,
            REASON_HOSTING_CLUSTER_VALID,
            format!("hosting cluster {hosting_cluster} is a managed cluster of the hub"),
        ));

        if hosting.is_deleting() {
            return self.cleanup_and_release(addon).await;
        }

        if addon.is_deleting() {
            // The hosted hook runs first; its finalizer holds the deploy works in place.
            if addon.has_finalizer(HOSTING_PRE_DELETE_HOOK_FINALIZER) {
                return Ok(());
            }
            return self.cleanup_and_release(addon).await;
        }

        if addon.add_finalizer(HOSTING_MANIFEST_FINALIZER) {
            return Ok(());
        }

        let existing = self.works.by_index(
            WorkIndexName::ByHostedAddon,
            &addon.namespace().unwrap_or_default(),
            &addon.name_any(),
        )?;
        let result = self
            .deployer
            .build_deploy_works(InstallMode::Hosted, &hosting_cluster, cluster, &existing, addon)
            .await;
        let built = match result {
            Ok(built) => built,
            Err(DeployError::Build(BuildError::EmptyManifests { .. })) => {
                debug!(
                    addon.namespace = %addon.namespace().unwrap_or_default(),
                    addon.name = %addon.name_any(),
                    "addon returned no manifests, removing hosting manifestworks"
                );
                return self.deployer.delete_works(&existing).await;
            }
            Err(e) => return Err(e),
        };

        let deleted = self.deployer.delete_works(&built.to_delete).await;
        let applied = self
            .deployer
            .apply_works(InstallMode::Hosted, built.to_apply, addon)
            .await;
        DeployError::aggregate([deleted.err(), applied.err()].into_iter().flatten().collect())
    }
}
