//! # Install Mode
//!
//! Where an addon's agent runs, where each of its manifests lands, and the
//! deterministic ManifestWork names derived from both.

use crate::constants::{
    CLUSTER_HOSTING_CLUSTER_NAME_ANNOTATION, HOSTED_MANIFEST_LOCATION_ANNOTATION,
    HOSTING_CLUSTER_NAME_ANNOTATION, KLUSTERLET_DEPLOY_MODE_ANNOTATION, PRE_DELETE_HOOK_ANNOTATION,
};
use crate::controller::addon_deploy::error::BuildError;
use crate::crd::{ManagedCluster, ManagedClusterAddOn};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallMode {
    /// Agent runs on the managed cluster; works live in the cluster namespace
    Default,
    /// Agent runs on a hosting cluster; works live in the hosting cluster namespace
    Hosted,
}

impl InstallMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMode::Default => "Default",
            InstallMode::Hosted => "Hosted",
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Default" => Ok(InstallMode::Default),
            "Hosted" => Ok(InstallMode::Hosted),
            other => Err(BuildError::InvalidInstallMode(other.to_string())),
        }
    }
}

/// Install mode of an addon together with its hosting cluster, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedModeInfo {
    pub mode: InstallMode,
    pub hosting_cluster: String,
}

impl HostedModeInfo {
    fn default_mode() -> Self {
        Self {
            mode: InstallMode::Default,
            hosting_cluster: String::new(),
        }
    }
}

/// Resolve the install mode of an addon.
///
/// The addon's own hosting-cluster annotation wins; otherwise the klusterlet
/// deploy mode annotated on the cluster decides.
pub fn hosted_mode_info(
    addon: &ManagedClusterAddOn,
    cluster: &ManagedCluster,
) -> Result<HostedModeInfo, BuildError> {
    let addon_hosting = addon
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(HOSTING_CLUSTER_NAME_ANNOTATION))
        .filter(|v| !v.is_empty());
    if let Some(hosting_cluster) = addon_hosting {
        return Ok(HostedModeInfo {
            mode: InstallMode::Hosted,
            hosting_cluster: hosting_cluster.clone(),
        });
    }

    let mode: InstallMode = cluster
        .annotation(KLUSTERLET_DEPLOY_MODE_ANNOTATION)
        .unwrap_or_default()
        .parse()?;
    if mode == InstallMode::Default {
        return Ok(HostedModeInfo::default_mode());
    }
    Ok(HostedModeInfo {
        mode,
        hosting_cluster: cluster
            .annotation(CLUSTER_HOSTING_CLUSTER_NAME_ANNOTATION)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Where a manifest lands when the addon runs in hosted mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLocation {
    Managed,
    Hosting,
    None,
}

impl ManifestLocation {
    /// Location annotated on a manifest, `Managed` when absent
    pub fn of(manifest: &Value) -> Result<Self, BuildError> {
        let Some(value) = manifest_annotation(manifest, HOSTED_MANIFEST_LOCATION_ANNOTATION) else {
            return Ok(ManifestLocation::Managed);
        };
        match value {
            "" | "managed" => Ok(ManifestLocation::Managed),
            "hosting" => Ok(ManifestLocation::Hosting),
            "none" => Ok(ManifestLocation::None),
            other => Err(BuildError::InvalidManifestLocation {
                manifest: manifest_display_name(manifest),
                value: other.to_string(),
            }),
        }
    }
}

/// Whether a manifest belongs to the works built for `target`.
///
/// `target` is the namespace role being built (managed cluster or hosting
/// cluster), `actual` is the install mode the addon currently runs in.
pub fn is_deployable(
    target: InstallMode,
    actual: InstallMode,
    hosted_mode_enabled: bool,
    manifest: &Value,
) -> Result<bool, BuildError> {
    let hosted = hosted_mode_enabled && actual == InstallMode::Hosted;
    let deployable = match target {
        InstallMode::Default => !hosted || ManifestLocation::of(manifest)? == ManifestLocation::Managed,
        InstallMode::Hosted => hosted && ManifestLocation::of(manifest)? == ManifestLocation::Hosting,
    };
    Ok(deployable)
}

/// Pre-delete hook objects carry the hook marker as an annotation or a label
#[must_use]
pub fn is_pre_delete_hook(manifest: &Value) -> bool {
    let metadata = manifest.get("metadata");
    ["annotations", "labels"].iter().any(|field| {
        metadata
            .and_then(|m| m.get(*field))
            .and_then(|m| m.get(PRE_DELETE_HOOK_ANNOTATION))
            .is_some()
    })
}

fn manifest_annotation<'a>(manifest: &'a Value, key: &str) -> Option<&'a str> {
    manifest
        .get("metadata")?
        .get("annotations")?
        .get(key)?
        .as_str()
}

pub(crate) fn manifest_display_name(manifest: &Value) -> String {
    let kind = manifest.get("kind").and_then(Value::as_str).unwrap_or("<unknown>");
    let metadata = manifest.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");
    match metadata.and_then(|m| m.get("namespace")).and_then(Value::as_str) {
        Some(ns) => format!("{kind} {ns}/{name}"),
        None => format!("{kind} {name}"),
    }
}

// Work names

/// Prefix shared by every deploy work of an addon in the managed cluster namespace
#[must_use]
pub fn deploy_work_name_prefix(addon: &str) -> String {
    format!("addon-{addon}-deploy")
}

/// Prefix shared by every deploy work of an addon in a hosting cluster namespace
#[must_use]
pub fn deploy_hosting_work_name_prefix(addon_namespace: &str, addon: &str) -> String {
    format!("{addon_namespace}-hosting-{}", deploy_work_name_prefix(addon))
}

#[must_use]
pub fn pre_delete_hook_work_name(addon: &str) -> String {
    format!("addon-{addon}-pre-delete")
}

#[must_use]
pub fn pre_delete_hook_hosting_work_name(addon_namespace: &str, addon: &str) -> String {
    format!("{addon_namespace}-hosting-{}", pre_delete_hook_work_name(addon))
}

/// Name of the `index`-th deploy work
#[must_use]
pub fn deploy_work_name(target: InstallMode, addon_namespace: &str, addon: &str, index: usize) -> String {
    match target {
        InstallMode::Default => format!("{}-{index}", deploy_work_name_prefix(addon)),
        InstallMode::Hosted => format!(
            "{}-{index}",
            deploy_hosting_work_name_prefix(addon_namespace, addon)
        ),
    }
}

#[must_use]
pub fn hook_work_name(target: InstallMode, addon_namespace: &str, addon: &str) -> String {
    match target {
        InstallMode::Default => pre_delete_hook_work_name(addon),
        InstallMode::Hosted => pre_delete_hook_hosting_work_name(addon_namespace, addon),
    }
}
