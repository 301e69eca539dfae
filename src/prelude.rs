//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use addon_deploy_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (ManagedClusterAddOn, ManagedCluster, ManifestWork, etc.)
//! - Provider traits and the built-in directory provider
//! - The engine and its store seams
//! - Config and plugin types

// CRD types - most commonly used
pub use crate::crd::*;

// Provider traits - needed for implementing addons
pub use crate::provider::{
    AddonRegistry, AgentAddon, AgentAddonOptions, DeploymentAvailabilityChecker,
    DirectoryManifestAddon, HealthChecker, HealthProber, ProbeField, Updater, WorkHealthProber,
};

// Engine types
pub use crate::controller::addon_deploy::{
    AddonClient, AddonDeployController, BuildError, DeployError, HubLister, InstallMode,
    WorkClient, WorkIndex, WorkIndexName,
};

// Config and composition root
pub use crate::config::ControllerConfig;
pub use crate::runtime::{AgentPlugin, Routine};
