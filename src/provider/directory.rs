//! # Directory Manifest Addon
//!
//! Addon provider backed by a directory of YAML manifests.
//!
//! Every `.yaml`/`.yml` file under the directory is read in file-name order and
//! split into documents. Before parsing, the placeholders `{{CLUSTER_NAME}}`,
//! `{{ADDON_NAME}}` and `{{INSTALL_NAMESPACE}}` are substituted for the cluster
//! and addon being synced.

use crate::crd::{ManagedCluster, ManagedClusterAddOn};
use crate::provider::{AgentAddon, AgentAddonOptions, HealthProber, Updater};
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::ResourceExt;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

/// Install namespace used when the addon does not set one
pub const DEFAULT_INSTALL_NAMESPACE: &str = "open-cluster-management-agent-addon";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(CLUSTER_NAME|ADDON_NAME|INSTALL_NAMESPACE)\s*\}\}")
        .expect("Failed to compile placeholder regex - this should never happen")
});

#[derive(Debug, Clone)]
pub struct DirectoryManifestAddon {
    addon_name: String,
    dir: PathBuf,
    hosted_mode_enabled: bool,
    health_prober: Option<HealthProber>,
    updaters: Vec<Updater>,
}

impl DirectoryManifestAddon {
    pub fn new(addon_name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            addon_name: addon_name.into(),
            dir: dir.into(),
            hosted_mode_enabled: false,
            health_prober: None,
            updaters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hosted_mode(mut self, enabled: bool) -> Self {
        self.hosted_mode_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_health_prober(mut self, prober: HealthProber) -> Self {
        self.health_prober = Some(prober);
        self
    }

    #[must_use]
    pub fn with_updaters(mut self, updaters: Vec<Updater>) -> Self {
        self.updaters = updaters;
        self
    }

    fn manifest_files(&self) -> Result<Vec<PathBuf>> {
        let entries = WalkDir::new(&self.dir)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("failed to read manifest directory {}", self.dir.display()))?;
        let mut files: Vec<PathBuf> = entries
            .into_iter()
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| is_yaml(p))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml")
}

/// Replace the known placeholders; unknown `{{...}}` text is left alone
fn render(template: &str, cluster: &str, addon: &str, install_namespace: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
            "CLUSTER_NAME" => cluster.to_string(),
            "ADDON_NAME" => addon.to_string(),
            _ => install_namespace.to_string(),
        })
        .into_owned()
}

/// Parse every non-empty YAML document in `content`
fn parse_documents(content: &str, path: &Path) -> Result<Vec<serde_json::Value>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_json::Value::deserialize(document)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if value.is_null() {
            continue;
        }
        objects.push(value);
    }
    Ok(objects)
}

#[async_trait]
impl AgentAddon for DirectoryManifestAddon {
    async fn manifests(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Vec<serde_json::Value>> {
        let cluster_name = cluster.name_any();
        let install_namespace = addon
            .spec
            .install_namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_INSTALL_NAMESPACE);

        let mut objects = Vec::new();
        for path in self.manifest_files()? {
            let template = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let rendered = render(&template, &cluster_name, &self.addon_name, install_namespace);
            objects.extend(parse_documents(&rendered, &path)?);
        }
        debug!(
            addon = %self.addon_name,
            cluster = %cluster_name,
            count = objects.len(),
            "loaded addon manifests"
        );
        Ok(objects)
    }

    fn options(&self) -> AgentAddonOptions {
        AgentAddonOptions {
            addon_name: self.addon_name.clone(),
            hosted_mode_enabled: self.hosted_mode_enabled,
            health_prober: self.health_prober.clone(),
            updaters: self.updaters.clone(),
        }
    }
}
