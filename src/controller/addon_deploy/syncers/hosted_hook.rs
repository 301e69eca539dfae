use crate::constants::HOSTING_PRE_DELETE_HOOK_FINALIZER;
use crate::controller::addon_deploy::error::DeployError;
use crate::controller::addon_deploy::index::WorkIndexName;
use crate::controller::addon_deploy::mode::InstallMode;
use crate::controller::addon_deploy::store::{HubLister, WorkIndex};
use crate::controller::addon_deploy::syncers::default_hook::record_hook_completion;
use crate::controller::addon_deploy::syncers::AddonDeploySyncer;
use crate::controller::addon_deploy::works::{resolve_hosted_mode, WorkDeployer};
use crate::crd::{ManagedCluster, ManagedClusterAddOn};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;

/// Runs the pre-delete hook work on the hosting cluster while a hosted addon
/// is being deleted
pub struct HostedHookSyncer {
    deployer: Arc<WorkDeployer>,
    works: Arc<dyn WorkIndex>,
    hub: Arc<dyn HubLister>,
}

impl std::fmt::Debug for HostedHookSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedHookSyncer").finish_non_exhaustive()
    }
}

impl HostedHookSyncer {
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

    async fn cleanup(&self, addon: &ManagedClusterAddOn) -> Result<(), DeployError> {
        if !addon.has_finalizer(HOSTING_PRE_DELETE_HOOK_FINALIZER) {
            return Ok(());
        }
        let works = self.works.by_index(
            WorkIndexName::HookByHostedAddon,
            &addon.namespace().unwrap_or_default(),
            &addon.name_any(),
        )?;
        self.deployer.delete_works(&works).await
    }

    async fn cleanup_and_release(&self, addon: &mut ManagedClusterAddOn) -> Result<(), DeployError> {
        self.cleanup(addon).await?;
        addon.remove_finalizer(HOSTING_PRE_DELETE_HOOK_FINALIZER);
        Ok(())
    }
}

#[async_trait]
impl AddonDeploySyncer for HostedHookSyncer {
    fn name(&self) -> &'static str {
        "hosted-hook"
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
            return Ok(());
        }

        let hosting_cluster = info.hosting_cluster;
        match self.hub.get_cluster(&hosting_cluster)? {
            None => return self.cleanup_and_release(addon).await,
            Some(hosting) if hosting.is_deleting() => {
                return self.cleanup_and_release(addon).await;
            }
            Some(_) => {}
        }

        let hook = self
            .deployer
            .build_hook_work(InstallMode::Hosted, &hosting_cluster, cluster, addon)
            .await?;
        let Some(hook) = hook else {
            addon.remove_finalizer(HOSTING_PRE_DELETE_HOOK_FINALIZER);
            return Ok(());
        };

        if !addon.is_deleting() {
            addon.add_finalizer(HOSTING_PRE_DELETE_HOOK_FINALIZER);
            return Ok(());
        }
        // Released finalizer: the hook already completed
        if !addon.has_finalizer(HOSTING_PRE_DELETE_HOOK_FINALIZER) {
            return Ok(());
        }

        let hook = self
            .deployer
            .apply_work(InstallMode::Hosted, hook, addon)
            .await?;
        if record_hook_completion(&hook, addon) {
            return self.cleanup_and_release(addon).await;
        }
        Ok(())
    }
}
