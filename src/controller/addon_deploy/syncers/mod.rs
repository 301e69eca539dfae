//! # Syncers
//!
//! The mode-specific passes run by the dispatcher, in this order:
//!
//! 1. `DefaultSyncer` - deploy works in the managed cluster namespace
//! 2. `HostedSyncer` - deploy works in the hosting cluster namespace
//! 3. `DefaultHookSyncer` - pre-delete hook work in the managed cluster namespace
//! 4. `HostedHookSyncer` - pre-delete hook work in the hosting cluster namespace
//! 5. `HealthCheckSyncer` - health mode and `Available` condition
//!
//! Each syncer mutates the in-memory addon copy only. Finalizer and status
//! changes are persisted afterwards by the `StatusReconciler`.

use crate::controller::addon_deploy::error::DeployError;
use crate::crd::{ManagedCluster, ManagedClusterAddOn};
use async_trait::async_trait;

mod default;
mod default_hook;
mod health_check;
mod hosted;
mod hosted_hook;

pub use default::DefaultSyncer;
pub use default_hook::{hook_work_is_completed, DefaultHookSyncer};
pub use health_check::HealthCheckSyncer;
pub use hosted::HostedSyncer;
pub use hosted_hook::HostedHookSyncer;

#[async_trait]
pub trait AddonDeploySyncer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn sync(
        &self,
        cluster: &ManagedCluster,
        addon: &mut ManagedClusterAddOn,
    ) -> Result<(), DeployError>;
}
