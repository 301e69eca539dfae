//! # Addon Deploy
//!
//! Reconciles the ManifestWorks that realise each registered addon on its
//! managed cluster, and reports the outcome as conditions on the addon.
//!
//! ## Flow
//!
//! 1. `AddonDeployController::sync` resolves the addon, its provider and its cluster
//! 2. the syncers build works from the provider's manifests and apply them
//! 3. the `StatusReconciler` persists finalizer and status changes with minimal patches
//!
//! Reads come from informer caches (`store`); writes go through `WorkApplier`
//! and `StatusReconciler` only.

pub mod applier;
pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod index;
pub mod key;
pub mod mode;
pub mod patch;
pub mod status;
pub mod store;
pub mod syncers;
pub mod works;

pub use applier::WorkApplier;
pub use builder::{BuiltWorks, ManifestSet, WorkBuilder};
pub use dispatcher::AddonDeployController;
pub use error::{BuildError, DeployError};
pub use index::WorkIndexName;
pub use key::AddonKey;
pub use mode::{HostedModeInfo, InstallMode};
pub use status::{StatusReconciler, StatusUpdate};
pub use store::{
    AddonClient, HubLister, KubeAddonClient, KubeWorkClient, ReflectorHubLister,
    ReflectorWorkIndex, WorkClient, WorkIndex,
};
pub use works::WorkDeployer;
