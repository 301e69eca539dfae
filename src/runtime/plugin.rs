//! # Agent Plugin
//!
//! The composition root. A binary declares one `AgentPlugin` literal naming
//! its addons, its configuration and any extra background routines, then
//! calls [`AgentPlugin::run`].
//!
//! ```rust,no_run
//! use addon_deploy_controller::prelude::*;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ControllerConfig::from_env();
//! let mut registry = AddonRegistry::new();
//! registry.register(std::sync::Arc::new(DirectoryManifestAddon::new(
//!     &config.addon_name,
//!     &config.addon_manifests_dir,
//! )));
//!
//! let plugin = AgentPlugin {
//!     name: "example-addon-manager".to_string(),
//!     registry,
//!     config,
//!     routines: Vec::new(),
//! };
//! plugin.run().await
//! # }
//! ```

use crate::config::ControllerConfig;
use crate::controller::server::{start_server, ServerState};
use crate::provider::AddonRegistry;
use crate::runtime::initialization::initialize;
use crate::runtime::watch_loop::run_watch_loop;
use anyhow::Result;
use async_trait::async_trait;
use kube::Client;
use std::sync::Arc;

/// A long-running task started next to the controller
#[async_trait]
pub trait Routine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, client: Client) -> Result<()>;
}

/// Serves `/metrics`, `/healthz` and `/readyz`
#[derive(Debug)]
pub struct MetricsServer {
    pub port: u16,
    pub state: Arc<ServerState>,
}

#[async_trait]
impl Routine for MetricsServer {
    fn name(&self) -> &str {
        "metrics-server"
    }

    async fn run(&self, _client: Client) -> Result<()> {
        start_server(self.port, Arc::clone(&self.state)).await
    }
}

pub struct AgentPlugin {
    pub name: String,
    pub registry: AddonRegistry,
    pub config: ControllerConfig,
    pub routines: Vec<Arc<dyn Routine>>,
}

impl std::fmt::Debug for AgentPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPlugin")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field(
                "routines",
                &self.routines.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AgentPlugin {
    /// Initialize the process and run the controller until shutdown
    pub async fn run(self) -> Result<()> {
        if self.registry.is_empty() {
            anyhow::bail!("plugin {} registers no addons", self.name);
        }
        let init = initialize(&self).await?;
        run_watch_loop(init.client, self.registry, self.config, init.server_state).await
    }
}
