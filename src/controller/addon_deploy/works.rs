//! # Work Deployer
//!
//! Glue between one addon provider, the pure `WorkBuilder` and the
//! `WorkApplier`. The syncers share it so that manifest retrieval and build
//! failures are reported on the addon the same way everywhere.

use crate::constants::{
    CONDITION_HOSTING_MANIFEST_APPLIED, CONDITION_MANIFEST_APPLIED, REASON_WORK_APPLY_FAILED,
};
use crate::controller::addon_deploy::applier::WorkApplier;
use crate::controller::addon_deploy::builder::{BuiltWorks, ManifestSet, WorkBuilder};
use crate::controller::addon_deploy::error::{BuildError, DeployError};
use crate::controller::addon_deploy::mode::{hosted_mode_info, HostedModeInfo, InstallMode};
use crate::crd::{Condition, ConditionStatus, ManagedCluster, ManagedClusterAddOn, ManifestWork};
use crate::provider::{AgentAddon, AgentAddonOptions};
use kube::ResourceExt;
use std::sync::Arc;

/// Addon condition recording whether the works of `mode` are applied
#[must_use]
pub fn applied_condition_type(mode: InstallMode) -> &'static str {
    match mode {
        InstallMode::Default => CONDITION_MANIFEST_APPLIED,
        InstallMode::Hosted => CONDITION_HOSTING_MANIFEST_APPLIED,
    }
}

/// Install mode of the addon for the hosted syncers; an invalid klusterlet
/// deploy mode is reported on the hosting applied condition
pub fn resolve_hosted_mode(
    cluster: &ManagedCluster,
    addon: &mut ManagedClusterAddOn,
) -> Result<HostedModeInfo, DeployError> {
    hosted_mode_info(addon, cluster).map_err(|err| {
        WorkDeployer::build_failed(InstallMode::Hosted, addon, &err);
        DeployError::from(err)
    })
}

pub struct WorkDeployer {
    agent: Arc<dyn AgentAddon>,
    options: AgentAddonOptions,
    builder: WorkBuilder,
    applier: Arc<WorkApplier>,
}

impl std::fmt::Debug for WorkDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkDeployer")
            .field("addon", &self.options.addon_name)
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl WorkDeployer {
    pub fn new(agent: Arc<dyn AgentAddon>, applier: Arc<WorkApplier>, manifest_limit: usize) -> Self {
        let options = agent.options();
        let builder = WorkBuilder::new(manifest_limit, options.hosted_mode_enabled);
        Self {
            agent,
            options,
            builder,
            applier,
        }
    }

    #[must_use]
    pub fn options(&self) -> &AgentAddonOptions {
        &self.options
    }

    /// Fetch the desired manifests fresh from the provider
    async fn manifest_set(
        &self,
        target: InstallMode,
        cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<ManifestSet, DeployError> {
        let fetched = self.agent.manifests(cluster, addon).await;
        match fetched {
            Ok(objects) => Ok(ManifestSet::new(objects, self.options.manifest_configs())),
            Err(source) => {
                addon.set_condition(Condition::new(
                    applied_condition_type(target),
                    ConditionStatus::False,
                    REASON_WORK_APPLY_FAILED,
                    format!("failed to get manifest from agent interface: {source:#}"),
                ));
                Err(DeployError::Manifests {
                    addon: addon.name_any(),
                    source,
                })
            }
        }
    }

    fn build_failed(target: InstallMode, addon: &mut ManagedClusterAddOn, err: &BuildError) {
        addon.set_condition(Condition::new(
            applied_condition_type(target),
            ConditionStatus::False,
            REASON_WORK_APPLY_FAILED,
            format!("failed to build manifestwork: {err}"),
        ));
    }

    /// Build the deploy works of `target` in `work_namespace`.
    ///
    /// `EmptyManifests` is returned without touching the addon; every other
    /// failure also sets the mode's applied condition False.
    pub async fn build_deploy_works(
        &self,
        target: InstallMode,
        work_namespace: &str,
        cluster: &ManagedCluster,
        existing: &[Arc<ManifestWork>],
        addon: &mut ManagedClusterAddOn,
    ) -> Result<BuiltWorks, DeployError> {
        let desired = self.manifest_set(target, cluster, addon).await?;
        let built = self
            .builder
            .build_deploy_works(target, work_namespace, cluster, existing, addon, &desired);
        match built {
            Ok(built) => Ok(built),
            Err(err @ BuildError::EmptyManifests { .. }) => Err(err.into()),
            Err(err) => {
                Self::build_failed(target, addon, &err);
                Err(err.into())
            }
        }
    }

    /// Build the pre-delete hook work of `target`; `None` when the addon has no hooks
    pub async fn build_hook_work(
        &self,
        target: InstallMode,
        work_namespace: &str,
        cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<Option<ManifestWork>, DeployError> {
        let desired = self.manifest_set(target, cluster, addon).await?;
        let built = self
            .builder
            .build_hook_work(target, work_namespace, cluster, addon, &desired);
        built.map_err(|err| {
            Self::build_failed(target, addon, &err);
            err.into()
        })
    }

    pub async fn apply_work(
        &self,
        target: InstallMode,
        work: ManifestWork,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<ManifestWork, DeployError> {
        self.applier
            .apply_work(applied_condition_type(target), work, addon)
            .await
    }

    /// Delete every work in `works`, attempting all of them
    pub async fn delete_works(&self, works: &[Arc<ManifestWork>]) -> Result<(), DeployError> {
        let mut errors: Vec<DeployError> = Vec::new();
        for work in works {
            let namespace = work.namespace().unwrap_or_default();
            if let Err(e) = self.applier.delete(&namespace, &work.name_any()).await {
                errors.push(e.into());
            }
        }
        DeployError::aggregate(errors)
    }

    /// Apply every work in `works` against `target`'s condition, attempting all of them
    pub async fn apply_works(
        &self,
        target: InstallMode,
        works: Vec<ManifestWork>,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<(), DeployError> {
        let mut errors = Vec::new();
        for work in works {
            if let Err(e) = self.apply_work(target, work, addon).await {
                errors.push(e);
            }
        }
        DeployError::aggregate(errors)
    }
}
