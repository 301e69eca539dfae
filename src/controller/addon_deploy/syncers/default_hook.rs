use crate::constants::{
    CONDITION_HOOK_MANIFEST_COMPLETED, PRE_DELETE_HOOK_FINALIZER, REASON_HOOK_COMPLETED,
    REASON_HOOK_NOT_COMPLETED, WORK_APPLIED, WORK_AVAILABLE,
};
use crate::controller::addon_deploy::error::DeployError;
use crate::controller::addon_deploy::mode::InstallMode;
use crate::controller::addon_deploy::syncers::AddonDeploySyncer;
use crate::controller::addon_deploy::works::WorkDeployer;
use crate::crd::condition::is_status_condition_true;
use crate::crd::{Condition, ConditionStatus, ManagedCluster, ManagedClusterAddOn, ManifestWork};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::info;

/// Runs the pre-delete hook work in the managed cluster namespace while the
/// addon is being deleted
pub struct DefaultHookSyncer {
    deployer: Arc<WorkDeployer>,
}

impl std::fmt::Debug for DefaultHookSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultHookSyncer").finish_non_exhaustive()
    }
}

impl DefaultHookSyncer {
    pub fn new(deployer: Arc<WorkDeployer>) -> Self {
        Self { deployer }
    }
}

#[async_trait]
impl AddonDeploySyncer for DefaultHookSyncer {
    fn name(&self) -> &'static str {
        "default-hook"
    }

    async fn sync(
        &self,
        cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<(), DeployError> {
        let namespace = addon.namespace().unwrap_or_default();
        let hook = self
            .deployer
            .build_hook_work(InstallMode::Default, &namespace, cluster, addon)
            .await?;
        let Some(hook) = hook else {
            addon.remove_finalizer(PRE_DELETE_HOOK_FINALIZER);
            return Ok(());
        };

        if !addon.is_deleting() {
            addon.add_finalizer(PRE_DELETE_HOOK_FINALIZER);
            return Ok(());
        }
        // Released finalizer: the hook already completed
        if !addon.has_finalizer(PRE_DELETE_HOOK_FINALIZER) {
            return Ok(());
        }

        let hook = self
            .deployer
            .apply_work(InstallMode::Default, hook, addon)
            .await?;
        if record_hook_completion(&hook, addon) {
            addon.remove_finalizer(PRE_DELETE_HOOK_FINALIZER);
        }
        Ok(())
    }
}

/// Set `HookManifestCompleted` from the hook work; returns whether it completed
pub(super) fn record_hook_completion(hook: &ManifestWork, addon: &mut ManagedClusterAddOn) -> bool {
    let name = hook.name_any();
    if hook_work_is_completed(hook) {
        info!(
            work.namespace = %hook.namespace().unwrap_or_default(),
            work.name = %name,
            "pre-delete hook completed"
        );
        addon.set_condition(Condition::new(
            CONDITION_HOOK_MANIFEST_COMPLETED,
            ConditionStatus::True,
            REASON_HOOK_COMPLETED,
            format!("hook manifestWork {name} is completed."),
        ));
        return true;
    }
    addon.set_condition(Condition::new(
        CONDITION_HOOK_MANIFEST_COMPLETED,
        ConditionStatus::False,
        REASON_HOOK_NOT_COMPLETED,
        format!("hook manifestWork {name} is not completed."),
    ));
    false
}

/// A hook work is completed once it is applied and available, and every Job
/// reports `JobComplete=True` and every Pod reports `PodPhase=Succeeded`.
#[must_use]
pub fn hook_work_is_completed(hook: &ManifestWork) -> bool {
    if !is_status_condition_true(hook.conditions(), WORK_APPLIED)
        || !is_status_condition_true(hook.conditions(), WORK_AVAILABLE)
    {
        return false;
    }
    let manifests = hook.manifest_conditions();
    if manifests.is_empty() {
        return false;
    }
    manifests.iter().all(|m| {
        let feedback = &m.status_feedback;
        match m.resource_meta.kind.as_str() {
            "Job" => feedback
                .value("JobComplete")
                .and_then(|v| v.string.as_deref())
                == Some("True"),
            "Pod" => feedback
                .value("PodPhase")
                .and_then(|v| v.string.as_deref())
                == Some("Succeeded"),
            _ => true,
        }
    })
}
