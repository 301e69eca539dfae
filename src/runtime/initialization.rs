//! # Initialization
//!
//! Process startup: rustls setup, tracing, metrics, the probe server,
//! background routines and the Kubernetes client.

use crate::controller::server::ServerState;
use crate::observability;
use crate::runtime::plugin::{AgentPlugin, MetricsServer, Routine};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};

const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Plugin routines
pub async fn initialize(plugin: &AgentPlugin) -> Result<InitializationResult> {
    // Must run before any TLS connection is made. An error only means a
    // provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let default_filter = plugin.config.default_log_filter();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!(plugin = %plugin.name, "Starting addon deploy controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(config = ?plugin.config, "Loaded configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server: Arc<dyn Routine> = Arc::new(MetricsServer {
        port: plugin.config.metrics_port,
        state: Arc::clone(&server_state),
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let server_handle = spawn_routine(server, client.clone());
    wait_for_server_ready(&server_state, &server_handle).await?;

    for routine in &plugin.routines {
        spawn_routine(Arc::clone(routine), client.clone());
    }

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        server_state,
    })
}

fn spawn_routine(routine: Arc<dyn Routine>, client: Client) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(routine = routine.name(), "Starting routine");
        if let Err(e) = routine.run(client).await {
            error!(routine = routine.name(), "Routine failed: {:#}", e);
        }
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &JoinHandle<()>,
) -> Result<()> {
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > SERVER_STARTUP_TIMEOUT {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                SERVER_STARTUP_TIMEOUT.as_secs()
            ));
        }

        tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
}
