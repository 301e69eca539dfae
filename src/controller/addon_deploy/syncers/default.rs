use crate::controller::addon_deploy::error::{BuildError, DeployError};
use crate::controller::addon_deploy::index::WorkIndexName;
use crate::controller::addon_deploy::mode::InstallMode;
use crate::controller::addon_deploy::store::WorkIndex;
use crate::controller::addon_deploy::syncers::AddonDeploySyncer;
use crate::controller::addon_deploy::works::WorkDeployer;
use crate::crd::{ManagedCluster, ManagedClusterAddOn};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::debug;

/// Deploys the addon workload into the managed cluster namespace
pub struct DefaultSyncer {
    deployer: Arc<WorkDeployer>,
    works: Arc<dyn WorkIndex>,
}

impl std::fmt::Debug for DefaultSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSyncer").finish_non_exhaustive()
    }
}

impl DefaultSyncer {
    pub fn new(deployer: Arc<WorkDeployer>, works: Arc<dyn WorkIndex>) -> Self {
        Self { deployer, works }
    }
}

#[async_trait]
impl AddonDeploySyncer for DefaultSyncer {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn sync(
        &self,
        cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<(), DeployError> {
        // Deletion is driven by the hook syncers and the owner references.
        if cluster.is_deleting() || addon.is_deleting() {
            return Ok(());
        }

        let namespace = addon.namespace().unwrap_or_default();
        let existing = self
            .works
            .by_index(WorkIndexName::ByAddon, &namespace, &addon.name_any())?;

        let result = self
            .deployer
            .build_deploy_works(InstallMode::Default, &namespace, cluster, &existing, addon)
            .await;
        let built = match result {
            Ok(built) => built,
            Err(DeployError::Build(BuildError::EmptyManifests { existing })) => {
                debug!(
                    addon.namespace = %namespace,
                    addon.name = %addon.name_any(),
                    existing,
                    "addon returned no manifests, keeping deployed works"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let deleted = self.deployer.delete_works(&built.to_delete).await;
        let applied = self
            .deployer
            .apply_works(InstallMode::Default, built.to_apply, addon)
            .await;
        DeployError::aggregate([deleted.err(), applied.err()].into_iter().flatten().collect())
    }
}
