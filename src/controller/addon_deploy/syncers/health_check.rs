use crate::constants::{
    CONDITION_AVAILABLE, CONDITION_MANIFEST_APPLIED, REASON_AVAILABLE_NO_PROBE_RESULT,
    REASON_AVAILABLE_PROBE_AVAILABLE, REASON_AVAILABLE_PROBE_UNAVAILABLE,
    REASON_AVAILABLE_WORK_APPLIED, REASON_AVAILABLE_WORK_NOT_FOUND, WORK_APPLIED,
};
use crate::controller::addon_deploy::error::DeployError;
use crate::controller::addon_deploy::index::WorkIndexName;
use crate::controller::addon_deploy::store::WorkIndex;
use crate::controller::addon_deploy::syncers::AddonDeploySyncer;
use crate::crd::condition::{find_status_condition, is_status_condition_true};
use crate::crd::{
    Condition, ConditionStatus, HealthCheckMode, ManagedCluster, ManagedClusterAddOn,
    ManifestWork, StatusFeedbackResult,
};
use crate::provider::{AgentAddonOptions, HealthProber, WorkHealthProber};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;

/// Sets the health check mode and, for work-probed addons, the `Available`
/// condition from the feedback of the deploy works already applied
pub struct HealthCheckSyncer {
    options: AgentAddonOptions,
    works: Arc<dyn WorkIndex>,
}

impl std::fmt::Debug for HealthCheckSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckSyncer")
            .field("health_prober", &self.options.health_prober)
            .finish_non_exhaustive()
    }
}

impl HealthCheckSyncer {
    pub fn new(options: AgentAddonOptions, works: Arc<dyn WorkIndex>) -> Self {
        Self { options, works }
    }

    fn probe(&self, addon: &mut ManagedClusterAddOn) -> Result<(), DeployError> {
        let Some(HealthProber::Work(prober)) = &self.options.health_prober else {
            return Ok(());
        };

        let Some(prober) = prober else {
            if is_status_condition_true(addon.conditions(), CONDITION_MANIFEST_APPLIED) {
                addon.set_condition(Condition::new(
                    CONDITION_AVAILABLE,
                    ConditionStatus::True,
                    REASON_AVAILABLE_WORK_APPLIED,
                    "Addon manifestWork is applied",
                ));
            }
            return Ok(());
        };

        // Nothing to probe before the deploy works were first applied
        if find_status_condition(addon.conditions(), CONDITION_MANIFEST_APPLIED).is_none() {
            return Ok(());
        }

        let works = match self.works.by_index(
            WorkIndexName::ByAddon,
            &addon.namespace().unwrap_or_default(),
            &addon.name_any(),
        ) {
            Ok(works) if !works.is_empty() => works,
            result => {
                addon.set_condition(Condition::new(
                    CONDITION_AVAILABLE,
                    ConditionStatus::Unknown,
                    REASON_AVAILABLE_WORK_NOT_FOUND,
                    "Addon manifestWork is not found",
                ));
                return result.map(|_| ());
            }
        };

        // A failed deployment is already reported by the applied condition.
        if works
            .iter()
            .any(|w| !is_status_condition_true(w.conditions(), WORK_APPLIED))
        {
            return Ok(());
        }

        addon.set_condition(probe_condition(prober, &works));
        Ok(())
    }
}

fn probe_condition(prober: &WorkHealthProber, works: &[Arc<ManifestWork>]) -> Condition {
    for field in &prober.probe_fields {
        let Some(feedback) = find_feedback(works, field) else {
            return Condition::new(
                CONDITION_AVAILABLE,
                ConditionStatus::Unknown,
                REASON_AVAILABLE_NO_PROBE_RESULT,
                "Probe results are not returned",
            );
        };
        if let Err(e) = prober.checker.check(&field.resource_identifier, feedback) {
            return Condition::new(
                CONDITION_AVAILABLE,
                ConditionStatus::False,
                REASON_AVAILABLE_PROBE_UNAVAILABLE,
                format!("Probe addon unavailable with err {e}"),
            );
        }
    }
    Condition::new(
        CONDITION_AVAILABLE,
        ConditionStatus::True,
        REASON_AVAILABLE_PROBE_AVAILABLE,
        "Addon is available",
    )
}

/// Feedback reported for the probed resource in any of the works
fn find_feedback<'a>(
    works: &'a [Arc<ManifestWork>],
    field: &crate::provider::ProbeField,
) -> Option<&'a StatusFeedbackResult> {
    works
        .iter()
        .flat_map(|w| w.manifest_conditions())
        .find(|m| field.resource_identifier.matches_meta(&m.resource_meta))
        .map(|m| &m.status_feedback)
}

#[async_trait]
impl AddonDeploySyncer for HealthCheckSyncer {
    fn name(&self) -> &'static str {
        "health-check"
    }

    async fn sync(
        &self,
        _cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<(), DeployError> {
        let Some(prober) = &self.options.health_prober else {
            return Ok(());
        };
        let mode = match prober {
            HealthProber::Lease => HealthCheckMode::Lease,
            HealthProber::None | HealthProber::Work(_) => HealthCheckMode::Customized,
        };
        let health = &mut addon.status_mut().health_check;
        if health.mode != Some(mode) {
            health.mode = Some(mode);
        }
        self.probe(addon)
    }
}
