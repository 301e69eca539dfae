//! # Status Reconciler
//!
//! Persists what the syncers changed on the in-memory addon copy.
//!
//! Finalizers and status are written separately. A finalizer change is sent
//! alone and ends the update; the status is written on a later pass. Status
//! writes are merge patches against the status subresource carrying only
//! conditions and health check, pinned to the observed `resourceVersion`.

use crate::controller::addon_deploy::error::DeployError;
use crate::controller::addon_deploy::patch::create_merge_patch;
use crate::controller::addon_deploy::store::AddonClient;
use crate::crd::{HealthCheck, ManagedClusterAddOn};
use crate::observability::metrics;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// What `StatusReconciler::update` wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Unchanged,
    Finalizers,
    Status,
}

pub struct StatusReconciler {
    client: Arc<dyn AddonClient>,
}

impl std::fmt::Debug for StatusReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReconciler").finish_non_exhaustive()
    }
}

impl StatusReconciler {
    pub fn new(client: Arc<dyn AddonClient>) -> Self {
        Self { client }
    }

    pub async fn update(
        &self,
        new: &ManagedClusterAddOn,
        old: &ManagedClusterAddOn,
    ) -> Result<StatusUpdate, DeployError> {
        let namespace = new.namespace().unwrap_or_default();
        let name = new.name_any();

        if new.finalizers() != old.finalizers() {
            let patch = finalizer_patch(new);
            info!(
                addon.namespace = %namespace,
                addon.name = %name,
                finalizers = ?new.finalizers(),
                "updating addon finalizers"
            );
            self.client.patch_metadata(&namespace, &name, &patch).await?;
            metrics::increment_status_patches("finalizers");
            return Ok(StatusUpdate::Finalizers);
        }

        let (new_conditions, new_health) = status_parts(new)?;
        let (old_conditions, old_health) = status_parts(old)?;
        if new_conditions == old_conditions && new_health == old_health {
            debug!(addon.namespace = %namespace, addon.name = %name, "addon status unchanged");
            metrics::increment_status_patch_skipped();
            return Ok(StatusUpdate::Unchanged);
        }

        let old_data = json!({
            "status": {
                "conditions": old_conditions,
                "healthCheck": serde_json::to_value(&old_health)?,
            }
        });
        let mut new_data = json!({
            "status": {
                "conditions": new_conditions,
                "healthCheck": serde_json::to_value(&new_health)?,
            }
        });
        let identity = identity_metadata(new);
        if !identity.is_empty() {
            if let Some(obj) = new_data.as_object_mut() {
                obj.insert("metadata".to_string(), Value::Object(identity));
            }
        }

        let patch = create_merge_patch(&old_data, &new_data);
        debug!(addon.namespace = %namespace, addon.name = %name, patch = %patch, "patching addon status");
        self.client.patch_status(&namespace, &name, &patch).await?;
        metrics::increment_status_patches("status");
        Ok(StatusUpdate::Status)
    }
}

fn status_parts(addon: &ManagedClusterAddOn) -> Result<(Value, HealthCheck), serde_json::Error> {
    let conditions = serde_json::to_value(addon.conditions())?;
    let health = addon
        .status
        .as_ref()
        .map(|s| s.health_check.clone())
        .unwrap_or_default();
    Ok((conditions, health))
}

fn identity_metadata(addon: &ManagedClusterAddOn) -> Map<String, Value> {
    let mut meta = Map::new();
    if let Some(uid) = &addon.metadata.uid {
        meta.insert("uid".to_string(), json!(uid));
    }
    if let Some(rv) = &addon.metadata.resource_version {
        meta.insert("resourceVersion".to_string(), json!(rv));
    }
    meta
}

/// Finalizer-only merge patch pinned to the observed resourceVersion
fn finalizer_patch(addon: &ManagedClusterAddOn) -> Value {
    let mut meta = Map::new();
    meta.insert("finalizers".to_string(), json!(addon.finalizers()));
    if let Some(rv) = &addon.metadata.resource_version {
        meta.insert("resourceVersion".to_string(), json!(rv));
    }
    json!({ "metadata": meta })
}
