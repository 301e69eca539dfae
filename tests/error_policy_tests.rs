//! # Error Policy Tests
//!
//! Requeue decisions for failed syncs: conflicts retry quickly, everything
//! else backs off per addon until the next success.

mod common;

use addon_deploy_controller::prelude::*;
use addon_deploy_controller::runtime::error_policy::handle_sync_error;
use addon_deploy_controller::runtime::Context;
use common::*;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

fn context() -> Arc<Context> {
    let hub = FakeHub::new();
    let controller = hub.controller(Arc::new(StaticAddon::new(Vec::new())), 1024);
    let config = ControllerConfig {
        backoff_min_secs: 1,
        backoff_max_secs: 5,
        conflict_requeue_ms: 250,
        ..ControllerConfig::default()
    };
    Arc::new(Context::new(Arc::new(controller), config))
}

fn addon(namespace: &str) -> Arc<ManagedClusterAddOn> {
    Arc::new(registered_addon(namespace, ADDON))
}

fn failure() -> DeployError {
    DeployError::Kube(api_error(500))
}

#[test]
fn test_conflict_requeues_after_fixed_delay() {
    let ctx = context();
    let conflict = DeployError::Kube(api_error(409));

    for _ in 0..3 {
        let action = handle_sync_error(addon(CLUSTER), &conflict, Arc::clone(&ctx));
        assert_eq!(action, Action::requeue(Duration::from_millis(250)));
    }
}

#[test]
fn test_errors_back_off_per_addon() {
    let ctx = context();

    let delays: Vec<Action> = (0..6)
        .map(|_| handle_sync_error(addon(CLUSTER), &failure(), Arc::clone(&ctx)))
        .collect();
    let expected: Vec<Action> = [1, 1, 2, 3, 5, 5]
        .into_iter()
        .map(|s| Action::requeue(Duration::from_secs(s)))
        .collect();
    assert_eq!(delays, expected, "fibonacci sequence capped at the maximum");

    // Another addon starts from the minimum
    let other = handle_sync_error(addon("cluster2"), &failure(), Arc::clone(&ctx));
    assert_eq!(other, Action::requeue(Duration::from_secs(1)));
}

#[test]
fn test_success_resets_backoff() {
    let ctx = context();
    for _ in 0..4 {
        handle_sync_error(addon(CLUSTER), &failure(), Arc::clone(&ctx));
    }

    ctx.reset_backoff(KEY);

    let action = handle_sync_error(addon(CLUSTER), &failure(), Arc::clone(&ctx));
    assert_eq!(action, Action::requeue(Duration::from_secs(1)));
}

#[test]
fn test_timeouts_back_off_like_errors() {
    let ctx = context();
    let timeout = DeployError::Timeout {
        key: KEY.to_string(),
        secs: 60,
    };
    assert!(timeout.is_timeout());
    assert!(!timeout.is_conflict());

    let action = handle_sync_error(addon(CLUSTER), &timeout, ctx);
    assert_eq!(action, Action::requeue(Duration::from_secs(1)));
}

#[test]
fn test_deleted_addons_lose_retry_state() {
    let ctx = context();
    for _ in 0..4 {
        handle_sync_error(addon(CLUSTER), &failure(), Arc::clone(&ctx));
    }
    for _ in 0..3 {
        handle_sync_error(addon("cluster2"), &failure(), Arc::clone(&ctx));
    }

    // cluster1/foo was deleted while failing
    let dropped = ctx.retain_backoff(|key| key == "cluster2/foo");
    assert_eq!(dropped, 1);

    let recreated = handle_sync_error(addon(CLUSTER), &failure(), Arc::clone(&ctx));
    assert_eq!(recreated, Action::requeue(Duration::from_secs(1)));
    let survivor = handle_sync_error(addon("cluster2"), &failure(), ctx);
    assert_eq!(survivor, Action::requeue(Duration::from_secs(3)));
}
