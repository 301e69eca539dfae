//! # Custom Resource Definitions
//!
//! Resource types the controller reads and writes.
//!
//! ## Module Structure
//!
//! - `addon.rs` - ManagedClusterAddOn (finalizers and status are owned here)
//! - `cluster.rs` - ManagedCluster (read-only)
//! - `work.rs` - ManifestWork, the deployable unit
//! - `condition.rs` - Status conditions and their set/find helpers

mod addon;
mod cluster;
pub mod condition;
mod work;

pub use addon::{
    HealthCheck, HealthCheckMode, ManagedClusterAddOn, ManagedClusterAddOnSpec,
    ManagedClusterAddOnStatus,
};
pub use cluster::{ManagedCluster, ManagedClusterSpec};
pub use condition::{Condition, ConditionStatus};
pub use work::{
    FeedbackRule, FeedbackRuleType, FeedbackValue, FieldValue, JsonPath,
    ManifestCondition, ManifestConfigOption, ManifestResourceMeta, ManifestResourceStatus,
    ManifestWork, ManifestWorkSpec, ManifestWorkStatus, ManifestsTemplate, ResourceIdentifier,
    ServerSideApplyConfig, StatusFeedbackResult, UpdateStrategy, UpdateStrategyType,
};
