//! Shared state handed to every reconcile and error-policy call.

use crate::config::ControllerConfig;
use crate::controller::addon_deploy::AddonDeployController;
use crate::controller::backoff::FibonacciBackoff;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Retry state of one addon key
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            backoff: FibonacciBackoff::new(config.backoff_min_secs, config.backoff_max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

#[derive(Debug)]
pub struct Context {
    pub controller: Arc<AddonDeployController>,
    pub config: ControllerConfig,
    /// Keyed by `cluster/addon`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Context {
    #[must_use]
    pub fn new(controller: Arc<AddonDeployController>, config: ControllerConfig) -> Self {
        Self {
            controller,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Forget the retry state of `key` after a successful sync
    pub fn reset_backoff(&self, key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(key);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }

    /// Advance the retry state of `key`, returning the delay and error count
    pub fn next_backoff(&self, key: &str) -> Option<(u64, u32)> {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(key.to_string())
                    .or_insert_with(|| BackoffState::new(&self.config));
                state.increment_error();
                Some((state.backoff.next_backoff_seconds(), state.error_count))
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                None
            }
        }
    }

    /// Drop the retry state of every key `is_live` rejects, returning how many were dropped
    pub fn retain_backoff(&self, is_live: impl Fn(&str) -> bool) -> usize {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let before = states.len();
                states.retain(|key, _| is_live(key));
                before - states.len()
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                0
            }
        }
    }
}
