//! # Watch Loop
//!
//! Runs the kube-runtime `Controller` over `ManagedClusterAddOn`. The
//! controller serializes syncs per key, coalesces repeated triggers and bounds
//! parallelism; ManifestWork and ManagedCluster events are mapped back to the
//! addons they affect.

use crate::config::ControllerConfig;
use crate::constants::{
    ADDON_LABEL_KEY, ADDON_NAMESPACE_LABEL_KEY, BACKOFF_PRUNE_INTERVAL_SECS,
    HOSTING_CLUSTER_NAME_ANNOTATION,
};
use crate::controller::addon_deploy::mode::{
    deploy_hosting_work_name_prefix, deploy_work_name_prefix, hosted_mode_info,
    pre_delete_hook_hosting_work_name, pre_delete_hook_work_name, InstallMode,
};
use crate::controller::addon_deploy::{
    AddonDeployController, AddonKey, DeployError, KubeAddonClient, KubeWorkClient,
    ReflectorHubLister, ReflectorWorkIndex,
};
use crate::controller::server::ServerState;
use crate::crd::{ManagedCluster, ManagedClusterAddOn, ManifestWork};
use crate::provider::AddonRegistry;
use crate::runtime::context::Context;
use crate::runtime::error_policy::{handle_sync_error, log_stream_error};
use anyhow::Result;
use futures::future::ready;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, Resource};
use kube_runtime::controller::{self, Action, Controller};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Run the controller until a shutdown signal is received
pub async fn run_watch_loop(
    client: Client,
    registry: AddonRegistry,
    config: ControllerConfig,
    server_state: Arc<ServerState>,
) -> Result<()> {
    info!(
        addons = ?registry.names().collect::<Vec<_>>(),
        "Starting addon deploy watch loop..."
    );

    let addons: Api<ManagedClusterAddOn> = Api::all(client.clone());
    let works: Api<ManifestWork> = Api::all(client.clone());
    let clusters: Api<ManagedCluster> = Api::all(client.clone());

    let work_store = spawn_reflector(works.clone());
    let cluster_store = spawn_reflector(clusters.clone());

    let addon_controller = Controller::new(addons, watcher::Config::default().any_semantic());
    let addon_store = addon_controller.store();

    let engine = Arc::new(AddonDeployController::new(
        registry.clone(),
        Arc::new(ReflectorHubLister::new(addon_store.clone(), cluster_store.clone())),
        Arc::new(ReflectorWorkIndex::new(work_store.clone())),
        Arc::new(KubeWorkClient::new(client.clone())),
        Arc::new(KubeAddonClient::new(client)),
        config.manifest_limit_bytes,
    ));
    let concurrency = config.max_concurrent_syncs;
    let ctx = Arc::new(Context::new(engine, config));

    // Writes decided against a cold cache would recreate existing works
    work_store.wait_until_ready().await?;
    cluster_store.wait_until_ready().await?;
    info!("ManifestWork and ManagedCluster caches synced");

    let registered: Arc<BTreeSet<String>> =
        Arc::new(registry.names().map(str::to_string).collect());
    let registered_for_works = Arc::clone(&registered);
    let registered_for_clusters = Arc::clone(&registered);
    let addons_for_clusters = addon_store.clone();
    let managed_clusters = cluster_store.clone();

    // Mark not ready as soon as shutdown starts so traffic drains first
    tokio::spawn(mark_not_ready_on(shutdown_signal(), Arc::clone(&server_state)));

    tokio::spawn(prune_backoff(Arc::clone(&ctx), addon_store.clone()));

    addon_controller
        .with_config(controller::Config::default().concurrency(concurrency))
        .watches(works, watcher::Config::default().any_semantic(), move |work| {
            work_owner(&work, &registered_for_works)
        })
        .watches(clusters, watcher::Config::default(), move |cluster| {
            cluster_addons(&cluster, &addons_for_clusters, &managed_clusters, &registered_for_clusters)
        })
        .shutdown_on_signal()
        .run(reconcile, handle_sync_error, ctx)
        .for_each(|result| {
            match result {
                Ok((obj, action)) => debug!(addon = %obj, ?action, "sync.completed"),
                // Already logged and requeued by the error policy
                Err(controller::Error::ReconcilerFailed(err, obj)) => {
                    debug!(addon = %obj, error = %err, "sync.failed");
                }
                Err(e) => log_stream_error(&format!("{e:?}")),
            }
            ready(())
        })
        .await;

    info!("Controller stopped gracefully");
    Ok(())
}

/// Periodically forget the retry state of addons that no longer exist
async fn prune_backoff(ctx: Arc<Context>, addons: Store<ManagedClusterAddOn>) {
    let period = Duration::from_secs(BACKOFF_PRUNE_INTERVAL_SECS);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let live: HashSet<String> = addons
            .state()
            .iter()
            .map(|addon| {
                AddonKey::new(
                    addon.metadata.namespace.as_deref().unwrap_or_default(),
                    addon.metadata.name.as_deref().unwrap_or_default(),
                )
                .to_string()
            })
            .collect();
        let dropped = ctx.retain_backoff(|key| live.contains(key));
        if dropped > 0 {
            debug!(dropped, "dropped retry state of deleted addons");
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

async fn mark_not_ready_on(signal: impl Future<Output = ()>, state: Arc<ServerState>) {
    signal.await;
    info!("Received shutdown signal, initiating graceful shutdown...");
    state.set_ready(false);
}

async fn reconcile(
    addon: Arc<ManagedClusterAddOn>,
    ctx: Arc<Context>,
) -> Result<Action, DeployError> {
    let key = AddonKey::new(
        addon.metadata.namespace.as_deref().unwrap_or_default(),
        addon.metadata.name.as_deref().unwrap_or_default(),
    )
    .to_string();

    let timeout = ctx.config.sync_timeout_duration();
    let synced = tokio::time::timeout(timeout, ctx.controller.sync(&key)).await;
    match synced {
        Ok(Ok(())) => {
            ctx.reset_backoff(&key);
            Ok(Action::await_change())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(DeployError::Timeout {
            key,
            secs: ctx.config.sync_timeout_secs,
        }),
    }
}

/// The addon that owns `work`, if it is one of ours.
///
/// Hosted works live in the hosting cluster namespace and point back at the
/// addon through the addon-namespace label.
#[must_use]
pub fn work_owner(
    work: &ManifestWork,
    registered: &BTreeSet<String>,
) -> Option<ObjectRef<ManagedClusterAddOn>> {
    let addon = work.label(ADDON_LABEL_KEY).filter(|a| registered.contains(*a))?;
    let namespace = match work.label(ADDON_NAMESPACE_LABEL_KEY).filter(|ns| !ns.is_empty()) {
        Some(addon_namespace) => addon_namespace,
        None => work.metadata.namespace.as_deref()?,
    };

    let name = work.metadata.name.as_deref().unwrap_or_default();
    let owned = name.starts_with(&deploy_work_name_prefix(addon))
        || name.starts_with(&deploy_hosting_work_name_prefix(namespace, addon))
        || name.starts_with(&pre_delete_hook_work_name(addon))
        || name.starts_with(&pre_delete_hook_hosting_work_name(namespace, addon));
    if !owned {
        return None;
    }
    Some(ObjectRef::new(addon).within(namespace))
}

/// Registered addons installed on `cluster` or hosted by it
fn cluster_addons(
    cluster: &ManagedCluster,
    addons: &Store<ManagedClusterAddOn>,
    clusters: &Store<ManagedCluster>,
    registered: &BTreeSet<String>,
) -> Vec<ObjectRef<ManagedClusterAddOn>> {
    let Some(cluster_name) = cluster.metadata.name.as_deref() else {
        return Vec::new();
    };
    addons_for_cluster(cluster_name, addons.state(), registered, |name| {
        clusters.get(&ObjectRef::new(name))
    })
}

/// Addons whose sync depends on the cluster named `cluster_name`.
///
/// That is every addon in the cluster's namespace, and every addon hosted on
/// it either through its own annotation or its managed cluster's klusterlet
/// annotations.
fn addons_for_cluster<F>(
    cluster_name: &str,
    addons: impl IntoIterator<Item = Arc<ManagedClusterAddOn>>,
    registered: &BTreeSet<String>,
    managed_cluster: F,
) -> Vec<ObjectRef<ManagedClusterAddOn>>
where
    F: Fn(&str) -> Option<Arc<ManagedCluster>>,
{
    addons
        .into_iter()
        .filter(|addon| {
            addon
                .metadata
                .name
                .as_deref()
                .is_some_and(|name| registered.contains(name))
        })
        .filter(|addon| {
            let namespace = addon.metadata.namespace.as_deref().unwrap_or_default();
            namespace == cluster_name
                || is_hosted_on(addon, managed_cluster(namespace).as_deref(), cluster_name)
        })
        .map(|addon| ObjectRef::from_obj(&*addon))
        .collect()
}

fn is_hosted_on(
    addon: &ManagedClusterAddOn,
    managed: Option<&ManagedCluster>,
    hosting_cluster: &str,
) -> bool {
    let annotated = addon
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(HOSTING_CLUSTER_NAME_ANNOTATION))
        .filter(|hosting| !hosting.is_empty());
    if let Some(hosting) = annotated {
        return hosting == hosting_cluster;
    }
    managed
        .and_then(|cluster| hosted_mode_info(addon, cluster).ok())
        .is_some_and(|info| info.mode == InstallMode::Hosted && info.hosting_cluster == hosting_cluster)
}

/// Start a reflector for `api` in the background and return its cache
fn spawn_reflector<K>(api: Api<K>) -> Store<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(
        writer,
        watcher(api, watcher::Config::default().any_semantic()),
    )
    .default_backoff()
    .touched_objects();

    tokio::spawn(async move {
        stream
            .for_each(|event| {
                if let Err(e) = event {
                    log_stream_error(&format!("{e:?}"));
                }
                ready(())
            })
            .await;
    });
    reader
}
