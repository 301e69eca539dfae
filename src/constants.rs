//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Label, annotation and condition strings are part of the wire contract with
//! the hub API and the work agents, so they must not change.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8000;

/// Default maximum serialized size of the manifests carried by one ManifestWork (500 KiB)
pub const DEFAULT_MANIFEST_LIMIT_BYTES: usize = 500 * 1024;

/// Default upper bound for a single sync (seconds)
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 60;

/// Default maximum number of addons synced in parallel
pub const DEFAULT_MAX_CONCURRENT_SYNCS: u16 = 10;

/// Default Fibonacci backoff floor for failed syncs (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default Fibonacci backoff ceiling for failed syncs (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default requeue delay after an optimistic-concurrency conflict (milliseconds)
pub const DEFAULT_CONFLICT_REQUEUE_MS: u64 = 500;

/// How often retry state of addons that no longer exist is dropped
pub const BACKOFF_PRUNE_INTERVAL_SECS: u64 = 300;

/// Field manager used for every write issued by this controller
pub const FIELD_MANAGER: &str = "addon-deploy-controller";

// Labels

/// Label on a ManifestWork naming the addon that owns it
pub const ADDON_LABEL_KEY: &str = "open-cluster-management.io/addon-name";

/// Label on a hosted ManifestWork naming the namespace of the owning addon
pub const ADDON_NAMESPACE_LABEL_KEY: &str = "addon.open-cluster-management.io/namespace";

// Annotations

/// Addon annotation naming the hosting cluster when the addon runs in hosted mode
pub const HOSTING_CLUSTER_NAME_ANNOTATION: &str = "addon.open-cluster-management.io/hosting-cluster-name";

/// Cluster annotation carrying the klusterlet deploy mode (Default or Hosted)
pub const KLUSTERLET_DEPLOY_MODE_ANNOTATION: &str =
    "import.open-cluster-management.io/klusterlet-deploy-mode";

/// Cluster annotation naming the hosting cluster of a hosted klusterlet
pub const CLUSTER_HOSTING_CLUSTER_NAME_ANNOTATION: &str =
    "import.open-cluster-management.io/hosting-cluster-name";

/// Manifest annotation deciding where a manifest lands in hosted mode
pub const HOSTED_MANIFEST_LOCATION_ANNOTATION: &str =
    "addon.open-cluster-management.io/hosted-manifest-location";

/// Manifest annotation (or label) marking a pre-delete hook object
pub const PRE_DELETE_HOOK_ANNOTATION: &str = "addon.open-cluster-management.io/addon-pre-delete";

// Finalizers

/// Guards the default-mode pre-delete hook
pub const PRE_DELETE_HOOK_FINALIZER: &str = "cluster.open-cluster-management.io/addon-pre-delete";

/// Guards the hosted-mode pre-delete hook
pub const HOSTING_PRE_DELETE_HOOK_FINALIZER: &str =
    "cluster.open-cluster-management.io/hosting-addon-pre-delete";

/// Guards cleanup of the deploy works placed on the hosting cluster
pub const HOSTING_MANIFEST_FINALIZER: &str =
    "cluster.open-cluster-management.io/hosting-manifests-cleanup";

// Addon condition types

pub const CONDITION_REGISTRATION_APPLIED: &str = "RegistrationApplied";
pub const CONDITION_MANIFEST_APPLIED: &str = "ManifestApplied";
pub const CONDITION_HOSTING_MANIFEST_APPLIED: &str = "HostingManifestApplied";
pub const CONDITION_HOOK_MANIFEST_COMPLETED: &str = "HookManifestCompleted";
pub const CONDITION_HOSTING_CLUSTER_VALIDITY: &str = "HostingClusterValidity";
pub const CONDITION_AVAILABLE: &str = "Available";

// Addon condition reasons

pub const REASON_WORK_APPLY_FAILED: &str = "ManifestWorkApplyFailed";
pub const REASON_MANIFESTS_APPLIED: &str = "AddonManifestApplied";
pub const REASON_MANIFESTS_APPLY_FAILED: &str = "AddonManifestAppliedFailed";
pub const REASON_HOOK_COMPLETED: &str = "HookManifestIsCompleted";
pub const REASON_HOOK_NOT_COMPLETED: &str = "HookManifestIsNotCompleted";
pub const REASON_HOSTING_CLUSTER_VALID: &str = "HostingClusterValid";
pub const REASON_HOSTING_CLUSTER_INVALID: &str = "HostingClusterInvalid";
pub const REASON_AVAILABLE_WORK_APPLIED: &str = "ManifestWorkApplied";
pub const REASON_AVAILABLE_WORK_NOT_FOUND: &str = "WorkNotFound";
pub const REASON_AVAILABLE_NO_PROBE_RESULT: &str = "NoProbeResult";
pub const REASON_AVAILABLE_PROBE_UNAVAILABLE: &str = "ProbeUnavailable";
pub const REASON_AVAILABLE_PROBE_AVAILABLE: &str = "ProbeAvailable";

// ManifestWork condition types reported by the work agent

pub const WORK_APPLIED: &str = "Applied";
pub const WORK_AVAILABLE: &str = "Available";

// Built-in directory provider

/// Default addon name served by the directory provider
pub const DEFAULT_ADDON_NAME: &str = "example-addon";

/// Default directory holding the addon's manifest templates
pub const DEFAULT_ADDON_MANIFESTS_DIR: &str = "/etc/addon-deploy/manifests";
