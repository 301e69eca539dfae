//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `addon_deploy_syncs_total` - Total number of addon syncs
//! - `addon_deploy_sync_errors_total` - Total number of failed addon syncs
//! - `addon_deploy_sync_duration_seconds` - Duration of addon syncs
//! - `addon_deploy_works_applied_total` - ManifestWork writes by operation (create, update)
//! - `addon_deploy_works_deleted_total` - ManifestWorks deleted
//! - `addon_deploy_status_patches_total` - Addon writes by kind (finalizers, status)
//! - `addon_deploy_status_patch_skipped_total` - Status writes skipped because nothing changed
//! - `addon_deploy_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SYNCS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("addon_deploy_syncs_total", "Total number of addon syncs")
        .expect("Failed to create SYNCS_TOTAL metric - this should never happen")
});

static SYNC_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "addon_deploy_sync_errors_total",
        "Total number of failed addon syncs",
    )
    .expect("Failed to create SYNC_ERRORS_TOTAL metric - this should never happen")
});

static SYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "addon_deploy_sync_duration_seconds",
            "Duration of addon syncs in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
    )
    .expect("Failed to create SYNC_DURATION metric - this should never happen")
});

static WORKS_APPLIED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "addon_deploy_works_applied_total",
            "Total number of ManifestWork writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create WORKS_APPLIED_TOTAL metric - this should never happen")
});

static WORKS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "addon_deploy_works_deleted_total",
        "Total number of ManifestWorks deleted",
    )
    .expect("Failed to create WORKS_DELETED_TOTAL metric - this should never happen")
});

static STATUS_PATCHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "addon_deploy_status_patches_total",
            "Total number of addon writes by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create STATUS_PATCHES_TOTAL metric - this should never happen")
});

static STATUS_PATCH_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "addon_deploy_status_patch_skipped_total",
        "Total number of addon status writes skipped because nothing changed",
    )
    .expect("Failed to create STATUS_PATCH_SKIPPED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("addon_deploy_requeues_total", "Total number of requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SYNCS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_DURATION.clone()))?;
    REGISTRY.register(Box::new(WORKS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_PATCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_PATCH_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_syncs() {
    SYNCS_TOTAL.inc();
}

pub fn increment_sync_errors() {
    SYNC_ERRORS_TOTAL.inc();
}

pub fn observe_sync_duration(duration: f64) {
    SYNC_DURATION.observe(duration);
}

pub fn increment_works_applied(operation: &str) {
    WORKS_APPLIED_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_works_deleted() {
    WORKS_DELETED_TOTAL.inc();
}

pub fn increment_status_patches(kind: &str) {
    STATUS_PATCHES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_status_patch_skipped() {
    STATUS_PATCH_SKIPPED_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = WORKS_APPLIED_TOTAL.with_label_values(&["create"]).get();
        increment_works_applied("create");
        assert!(WORKS_APPLIED_TOTAL.with_label_values(&["create"]).get() > before);

        let skipped = STATUS_PATCH_SKIPPED_TOTAL.get();
        increment_status_patch_skipped();
        assert!(STATUS_PATCH_SKIPPED_TOTAL.get() > skipped);
    }
}
