//! Common test utilities for addon deploy tests
//!
//! An in-memory hub: addons, clusters and works live in maps, writes are
//! recorded and applied to the maps the way the API server would, so a second
//! sync sees the result of the first.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use addon_deploy_controller::controller::addon_deploy::index::{index_key, index_lookup_key};
use addon_deploy_controller::prelude::*;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const CLUSTER: &str = "cluster1";
pub const ADDON: &str = "foo";
pub const KEY: &str = "cluster1/foo";

/// A write the controller sent to the hub
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateWork { namespace: String, name: String },
    PatchWork { namespace: String, name: String, patch: Value },
    DeleteWork { namespace: String, name: String },
    PatchAddonMetadata { name: String, patch: Value },
    PatchAddonStatus { name: String, patch: Value },
}

type Key = (String, String);

#[derive(Debug, Default)]
pub struct FakeHub {
    addons: Mutex<BTreeMap<Key, ManagedClusterAddOn>>,
    clusters: Mutex<BTreeMap<String, ManagedCluster>>,
    works: Mutex<BTreeMap<Key, ManifestWork>>,
    calls: Mutex<Vec<Call>>,
    fail_work_writes: Mutex<Option<u16>>,
    resource_version: Mutex<u64>,
}

impl FakeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_addon(&self, addon: ManagedClusterAddOn) {
        let key = (
            addon.metadata.namespace.clone().unwrap_or_default(),
            addon.metadata.name.clone().unwrap_or_default(),
        );
        self.addons.lock().unwrap().insert(key, addon);
    }

    pub fn add_cluster(&self, cluster: ManagedCluster) {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        self.clusters.lock().unwrap().insert(name, cluster);
    }

    pub fn remove_cluster(&self, name: &str) {
        self.clusters.lock().unwrap().remove(name);
    }

    pub fn addon(&self, namespace: &str, name: &str) -> ManagedClusterAddOn {
        self.addons
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .expect("addon exists")
    }

    pub fn work(&self, namespace: &str, name: &str) -> Option<ManifestWork> {
        self.works
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn work_names(&self) -> Vec<String> {
        self.works
            .lock()
            .unwrap()
            .keys()
            .map(|(ns, name)| format!("{ns}/{name}"))
            .collect()
    }

    /// Mark the addon as deleting, as the API server does when it has finalizers
    pub fn delete_addon(&self, namespace: &str, name: &str) {
        let mut addons = self.addons.lock().unwrap();
        let addon = addons
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("addon exists");
        let now: Time = serde_json::from_value(json!("2026-01-01T00:00:00Z")).unwrap();
        addon.metadata.deletion_timestamp = Some(now);
    }

    /// Edit the stored addon in place, keeping finalizers and status
    pub fn update_addon(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut ManagedClusterAddOn)) {
        let mut addons = self.addons.lock().unwrap();
        let addon = addons
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("addon exists");
        edit(addon);
    }

    /// Report work status the way the work agent would
    pub fn set_work_status(&self, namespace: &str, name: &str, status: ManifestWorkStatus) {
        let mut works = self.works.lock().unwrap();
        let work = works
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("work exists");
        work.status = Some(status);
    }

    /// Fail every ManifestWork write with the given HTTP status
    pub fn fail_work_writes(&self, code: u16) {
        *self.fail_work_writes.lock().unwrap() = Some(code);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Drain the recorded calls
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_resource_version(&self) -> String {
        let mut rv = self.resource_version.lock().unwrap();
        *rv += 1;
        rv.to_string()
    }

    fn injected_failure(&self) -> Option<kube::Error> {
        self.fail_work_writes.lock().unwrap().map(api_error)
    }

    /// Controller wired to this hub for the given provider
    pub fn controller(self: &Arc<Self>, agent: Arc<dyn AgentAddon>, manifest_limit: usize) -> AddonDeployController {
        let mut registry = AddonRegistry::new();
        registry.register(agent);
        AddonDeployController::new(
            registry,
            Arc::clone(self) as Arc<dyn HubLister>,
            Arc::clone(self) as Arc<dyn WorkIndex>,
            Arc::clone(self) as Arc<dyn WorkClient>,
            Arc::clone(self) as Arc<dyn AddonClient>,
            manifest_limit,
        )
    }
}

pub fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure with status {code}"),
        reason: "Injected".to_string(),
        code,
    })
}

fn merge_into<T>(object: &T, patch: &Value) -> T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut value = serde_json::to_value(object).unwrap();
    json_patch::merge(&mut value, patch);
    serde_json::from_value(value).unwrap()
}

impl HubLister for FakeHub {
    fn get_addon(&self, namespace: &str, name: &str) -> Result<Option<Arc<ManagedClusterAddOn>>, DeployError> {
        Ok(self
            .addons
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .map(Arc::new))
    }

    fn get_cluster(&self, name: &str) -> Result<Option<Arc<ManagedCluster>>, DeployError> {
        Ok(self.clusters.lock().unwrap().get(name).cloned().map(Arc::new))
    }
}

impl WorkIndex for FakeHub {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<ManifestWork>> {
        self.work(namespace, name).map(Arc::new)
    }

    fn by_index(
        &self,
        index: WorkIndexName,
        namespace: &str,
        addon: &str,
    ) -> Result<Vec<Arc<ManifestWork>>, DeployError> {
        let wanted = index_lookup_key(namespace, addon);
        Ok(self
            .works
            .lock()
            .unwrap()
            .values()
            .filter(|w| index_key(index, w).as_deref() == Some(wanted.as_str()))
            .cloned()
            .map(Arc::new)
            .collect())
    }
}

#[async_trait]
impl WorkClient for FakeHub {
    async fn create(&self, work: &ManifestWork) -> Result<ManifestWork, kube::Error> {
        let namespace = work.metadata.namespace.clone().unwrap_or_default();
        let name = work.metadata.name.clone().unwrap_or_default();
        self.record(Call::CreateWork {
            namespace: namespace.clone(),
            name: name.clone(),
        });
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        let mut created = work.clone();
        created.metadata.uid = Some(format!("uid-{name}"));
        created.metadata.resource_version = Some(self.next_resource_version());
        self.works
            .lock()
            .unwrap()
            .insert((namespace, name), created.clone());
        Ok(created)
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<ManifestWork, kube::Error> {
        self.record(Call::PatchWork {
            namespace: namespace.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
        });
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        let key = (namespace.to_string(), name.to_string());
        let mut works = self.works.lock().unwrap();
        let Some(existing) = works.get(&key) else {
            return Err(api_error(404));
        };
        let mut updated: ManifestWork = merge_into(existing, patch);
        updated.metadata.resource_version = Some(self.next_resource_version());
        works.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        self.record(Call::DeleteWork {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        match self
            .works
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(api_error(404)),
        }
    }
}

#[async_trait]
impl AddonClient for FakeHub {
    async fn patch_metadata(&self, namespace: &str, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.record(Call::PatchAddonMetadata {
            name: name.to_string(),
            patch: patch.clone(),
        });
        self.apply_addon_patch(namespace, name, patch)
    }

    async fn patch_status(&self, namespace: &str, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.record(Call::PatchAddonStatus {
            name: name.to_string(),
            patch: patch.clone(),
        });
        self.apply_addon_patch(namespace, name, patch)
    }
}

impl FakeHub {
    fn apply_addon_patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<(), kube::Error> {
        let key = (namespace.to_string(), name.to_string());
        let mut addons = self.addons.lock().unwrap();
        let Some(existing) = addons.get(&key) else {
            return Err(api_error(404));
        };
        let mut updated: ManagedClusterAddOn = merge_into(existing, patch);
        updated.metadata.resource_version = Some(self.next_resource_version());
        addons.insert(key, updated);
        Ok(())
    }
}

/// Addon provider serving a fixed, swappable manifest list
#[derive(Debug)]
pub struct StaticAddon {
    options: AgentAddonOptions,
    manifests: Mutex<Result<Vec<Value>, String>>,
}

impl StaticAddon {
    pub fn new(manifests: Vec<Value>) -> Self {
        Self::with_options(
            AgentAddonOptions {
                addon_name: ADDON.to_string(),
                ..AgentAddonOptions::default()
            },
            manifests,
        )
    }

    pub fn with_options(options: AgentAddonOptions, manifests: Vec<Value>) -> Self {
        Self {
            options,
            manifests: Mutex::new(Ok(manifests)),
        }
    }

    pub fn set_manifests(&self, manifests: Vec<Value>) {
        *self.manifests.lock().unwrap() = Ok(manifests);
    }

    pub fn fail_with(&self, message: &str) {
        *self.manifests.lock().unwrap() = Err(message.to_string());
    }
}

#[async_trait]
impl AgentAddon for StaticAddon {
    async fn manifests(
        &self,
        _cluster: &ManagedCluster,
        _addon: &ManagedClusterAddOn,
    ) -> anyhow::Result<Vec<Value>> {
        self.manifests
            .lock()
            .unwrap()
            .clone()
            .map_err(|message| anyhow::anyhow!(message))
    }

    fn options(&self) -> AgentAddonOptions {
        self.options.clone()
    }
}

/// Addon that passed registration, so deploys may start
pub fn registered_addon(cluster: &str, name: &str) -> ManagedClusterAddOn {
    let mut addon = ManagedClusterAddOn::new(name, ManagedClusterAddOnSpec::default());
    addon.metadata.namespace = Some(cluster.to_string());
    addon.metadata.uid = Some(format!("uid-{cluster}-{name}"));
    addon.metadata.resource_version = Some("1".to_string());
    addon.set_condition(Condition::new(
        "RegistrationApplied",
        ConditionStatus::True,
        "SetPermissionApplied",
        "Registration of the addon agent is configured",
    ));
    addon
}

pub fn cluster(name: &str) -> ManagedCluster {
    ManagedCluster::new(name, ManagedClusterSpec::default())
}

/// Cluster carrying the given annotations
pub fn annotated_cluster(name: &str, annotations: &[(&str, &str)]) -> ManagedCluster {
    let mut cluster = cluster(name);
    cluster.metadata.annotations = Some(
        annotations
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    );
    cluster
}

pub fn config_map(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name, "namespace": "open-cluster-management-agent-addon"},
        "data": {"key": "value"},
    })
}

pub fn deployment(namespace: &str, name: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"replicas": 1},
    })
}

pub fn pre_delete_job(name: &str) -> Value {
    json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": name,
            "namespace": "open-cluster-management-agent-addon",
            "annotations": {"addon.open-cluster-management.io/addon-pre-delete": ""},
        },
        "spec": {"template": {"spec": {"restartPolicy": "Never"}}},
    })
}

/// Annotate a manifest with its hosted-mode location
pub fn located(mut manifest: Value, location: &str) -> Value {
    manifest["metadata"]["annotations"]["addon.open-cluster-management.io/hosted-manifest-location"] =
        json!(location);
    manifest
}

pub fn work_condition(type_: &str, status: ConditionStatus) -> Condition {
    Condition::new(type_, status, "WorkAgentReport", "reported by the work agent")
}

pub fn applied_status() -> ManifestWorkStatus {
    ManifestWorkStatus {
        conditions: vec![work_condition("Applied", ConditionStatus::True)],
        ..ManifestWorkStatus::default()
    }
}

/// Work status reporting the hook Job `name` as finished
pub fn completed_job_status(name: &str) -> ManifestWorkStatus {
    ManifestWorkStatus {
        conditions: vec![
            work_condition("Applied", ConditionStatus::True),
            work_condition("Available", ConditionStatus::True),
        ],
        resource_status: ManifestResourceStatus {
            manifests: vec![ManifestCondition {
                resource_meta: ManifestResourceMeta {
                    group: "batch".to_string(),
                    version: "v1".to_string(),
                    kind: "Job".to_string(),
                    resource: "jobs".to_string(),
                    name: name.to_string(),
                    namespace: "open-cluster-management-agent-addon".to_string(),
                    ordinal: 0,
                },
                status_feedback: StatusFeedbackResult {
                    values: vec![FeedbackValue {
                        name: "JobComplete".to_string(),
                        field_value: FieldValue {
                            r#type: "String".to_string(),
                            string: Some("True".to_string()),
                            ..FieldValue::default()
                        },
                    }],
                },
                conditions: Vec::new(),
            }],
        },
    }
}

/// Condition of the stored addon, if set
pub fn addon_condition(hub: &FakeHub, type_: &str) -> Option<Condition> {
    hub.addon(CLUSTER, ADDON)
        .conditions()
        .iter()
        .find(|c| c.r#type == type_)
        .cloned()
}
