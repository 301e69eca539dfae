//! # Store Access
//!
//! The seams between the engine and the API server. Reads go through
//! informer-style caches (`HubLister`, `WorkIndex`); writes go through the
//! narrow client traits (`WorkClient`, `AddonClient`).
//!
//! The kube-backed implementations live here too; tests substitute in-memory
//! fakes.

use crate::constants::FIELD_MANAGER;
use crate::controller::addon_deploy::error::DeployError;
use crate::controller::addon_deploy::index::{index_key, index_lookup_key, WorkIndexName};
use crate::crd::{ManagedCluster, ManagedClusterAddOn, ManifestWork};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::Client;
use serde_json::Value;
use std::sync::Arc;

/// Cached reads of addons and clusters
pub trait HubLister: Send + Sync {
    fn get_addon(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<ManagedClusterAddOn>>, DeployError>;

    fn get_cluster(&self, name: &str) -> Result<Option<Arc<ManagedCluster>>, DeployError>;
}

/// Cached reads of ManifestWorks
pub trait WorkIndex: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<ManifestWork>>;

    /// Works indexed under `namespace/addon` by `index`
    fn by_index(
        &self,
        index: WorkIndexName,
        namespace: &str,
        addon: &str,
    ) -> Result<Vec<Arc<ManifestWork>>, DeployError>;
}

#[async_trait]
pub trait WorkClient: Send + Sync {
    async fn create(&self, work: &ManifestWork) -> Result<ManifestWork, kube::Error>;

    /// JSON merge patch
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<ManifestWork, kube::Error>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;
}

#[async_trait]
pub trait AddonClient: Send + Sync {
    /// JSON merge patch against the main resource (finalizers)
    async fn patch_metadata(&self, namespace: &str, name: &str, patch: &Value)
        -> Result<(), kube::Error>;

    /// JSON merge patch against the status subresource
    async fn patch_status(&self, namespace: &str, name: &str, patch: &Value)
        -> Result<(), kube::Error>;
}

/// `HubLister` over reflector stores
#[derive(Clone)]
pub struct ReflectorHubLister {
    addons: Store<ManagedClusterAddOn>,
    clusters: Store<ManagedCluster>,
}

impl ReflectorHubLister {
    #[must_use]
    pub fn new(addons: Store<ManagedClusterAddOn>, clusters: Store<ManagedCluster>) -> Self {
        Self { addons, clusters }
    }
}

impl std::fmt::Debug for ReflectorHubLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectorHubLister")
            .field("addons", &self.addons.state().len())
            .field("clusters", &self.clusters.state().len())
            .finish()
    }
}

impl HubLister for ReflectorHubLister {
    fn get_addon(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<ManagedClusterAddOn>>, DeployError> {
        Ok(self.addons.get(&ObjectRef::new(name).within(namespace)))
    }

    fn get_cluster(&self, name: &str) -> Result<Option<Arc<ManagedCluster>>, DeployError> {
        Ok(self.clusters.get(&ObjectRef::new(name)))
    }
}

/// `WorkIndex` over a reflector store
#[derive(Clone)]
pub struct ReflectorWorkIndex {
    works: Store<ManifestWork>,
}

impl ReflectorWorkIndex {
    #[must_use]
    pub fn new(works: Store<ManifestWork>) -> Self {
        Self { works }
    }
}

impl std::fmt::Debug for ReflectorWorkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectorWorkIndex")
            .field("works", &self.works.state().len())
            .finish()
    }
}

impl WorkIndex for ReflectorWorkIndex {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<ManifestWork>> {
        self.works.get(&ObjectRef::new(name).within(namespace))
    }

    fn by_index(
        &self,
        index: WorkIndexName,
        namespace: &str,
        addon: &str,
    ) -> Result<Vec<Arc<ManifestWork>>, DeployError> {
        let key = index_lookup_key(namespace, addon);
        let mut works: Vec<_> = self
            .works
            .state()
            .into_iter()
            .filter(|w| index_key(index, w).as_deref() == Some(key.as_str()))
            .collect();
        works.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(works)
    }
}

/// `WorkClient` against the API server
#[derive(Clone)]
pub struct KubeWorkClient {
    client: Client,
}

impl KubeWorkClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ManifestWork> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl std::fmt::Debug for KubeWorkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWorkClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl WorkClient for KubeWorkClient {
    async fn create(&self, work: &ManifestWork) -> Result<ManifestWork, kube::Error> {
        let namespace = work.metadata.namespace.as_deref().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        self.api(namespace).create(&params, work).await
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<ManifestWork, kube::Error> {
        self.api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        self.api(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
    }
}

/// `AddonClient` against the API server
#[derive(Clone)]
pub struct KubeAddonClient {
    client: Client,
}

impl KubeAddonClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ManagedClusterAddOn> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl std::fmt::Debug for KubeAddonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeAddonClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl AddonClient for KubeAddonClient {
    async fn patch_metadata(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), kube::Error> {
        self.api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map(|_| ())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), kube::Error> {
        self.api(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map(|_| ())
    }
}
