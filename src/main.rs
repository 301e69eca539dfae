//! # Addon Deploy Controller
//!
//! Hub-side controller that deploys one addon, read from a directory of
//! manifest templates, to every managed cluster that enables it.
//!
//! Settings come from the environment (see `ControllerConfig::from_env`);
//! command-line flags take precedence.

use addon_deploy_controller::prelude::*;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "addon-deploy-controller", version, about, long_about = None)]
struct Args {
    /// Name of the addon to deploy
    #[arg(long)]
    addon_name: Option<String>,

    /// Directory of manifest templates
    #[arg(long)]
    manifests_dir: Option<PathBuf>,

    /// Allow the addon to run in hosted mode
    #[arg(long)]
    hosted_mode: Option<bool>,

    /// Deployment availability is reported from this Deployment's ready replicas
    /// (`namespace/name`); without it the addon is available once its works apply
    #[arg(long)]
    probe_deployment: Option<String>,

    /// Port of the metrics and probe server
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Maximum number of addons synced in parallel
    #[arg(long)]
    max_concurrent_syncs: Option<u16>,

    /// Maximum manifest bytes per ManifestWork
    #[arg(long)]
    manifest_limit_bytes: Option<usize>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ControllerConfig) -> Option<String> {
        if let Some(name) = self.addon_name {
            config.addon_name = name;
        }
        if let Some(dir) = self.manifests_dir {
            config.addon_manifests_dir = dir;
        }
        if let Some(hosted) = self.hosted_mode {
            config.hosted_mode_enabled = hosted;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(concurrency) = self.max_concurrent_syncs {
            config.max_concurrent_syncs = concurrency;
        }
        if let Some(limit) = self.manifest_limit_bytes {
            config.manifest_limit_bytes = limit;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        self.probe_deployment
    }
}

fn health_prober(probe_deployment: Option<&str>) -> Result<HealthProber> {
    let Some(target) = probe_deployment else {
        return Ok(HealthProber::Work(None));
    };
    let (namespace, name) = target
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("--probe-deployment must be namespace/name, got {target}"))?;
    Ok(HealthProber::Work(Some(WorkHealthProber {
        probe_fields: vec![ProbeField::well_known(ResourceIdentifier::new(
            "apps",
            "deployments",
            namespace,
            name,
        ))],
        checker: Arc::new(DeploymentAvailabilityChecker),
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = ControllerConfig::from_env();
    let probe_deployment = Args::parse().apply(&mut config);

    let addon = DirectoryManifestAddon::new(&config.addon_name, &config.addon_manifests_dir)
        .with_hosted_mode(config.hosted_mode_enabled)
        .with_health_prober(health_prober(probe_deployment.as_deref())?);

    let mut registry = AddonRegistry::new();
    registry.register(Arc::new(addon));

    let plugin = AgentPlugin {
        name: format!("{}-manager", config.addon_name),
        registry,
        config,
        routines: Vec::new(),
    };
    plugin.run().await
}
