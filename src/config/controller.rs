//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum number of addons synced in parallel
    pub max_concurrent_syncs: u16,
    /// Maximum serialized size of the manifests carried by one ManifestWork (bytes)
    pub manifest_limit_bytes: usize,
    /// Upper bound for a single sync (seconds)
    /// A sync exceeding it is abandoned and retried with backoff
    pub sync_timeout_secs: u64,
    /// Fibonacci backoff floor for failed syncs (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for failed syncs (seconds)
    pub backoff_max_secs: u64,
    /// Requeue delay after an optimistic-concurrency conflict (milliseconds)
    pub conflict_requeue_ms: u64,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    /// Used when `RUST_LOG` is not set
    pub log_level: String,
    /// Name of the addon served by the built-in directory provider
    pub addon_name: String,
    /// Directory holding the addon's manifest templates
    pub addon_manifests_dir: PathBuf,
    /// Whether the addon supports hosted mode
    pub hosted_mode_enabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_syncs: DEFAULT_MAX_CONCURRENT_SYNCS,
            manifest_limit_bytes: DEFAULT_MANIFEST_LIMIT_BYTES,
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            conflict_requeue_ms: DEFAULT_CONFLICT_REQUEUE_MS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            addon_name: DEFAULT_ADDON_NAME.to_string(),
            addon_manifests_dir: PathBuf::from(DEFAULT_ADDON_MANIFESTS_DIR),
            hosted_mode_enabled: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_syncs: env_var_or_default(
                "MAX_CONCURRENT_SYNCS",
                DEFAULT_MAX_CONCURRENT_SYNCS,
            ),
            manifest_limit_bytes: env_var_or_default(
                "MANIFEST_LIMIT_BYTES",
                DEFAULT_MANIFEST_LIMIT_BYTES,
            ),
            sync_timeout_secs: env_var_or_default("SYNC_TIMEOUT_SECS", DEFAULT_SYNC_TIMEOUT_SECS),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            conflict_requeue_ms: env_var_or_default(
                "CONFLICT_REQUEUE_MS",
                DEFAULT_CONFLICT_REQUEUE_MS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            addon_name: env_var_or_default_str("ADDON_NAME", DEFAULT_ADDON_NAME),
            addon_manifests_dir: PathBuf::from(env_var_or_default_str(
                "ADDON_MANIFESTS_DIR",
                DEFAULT_ADDON_MANIFESTS_DIR,
            )),
            hosted_mode_enabled: env_var_or_default_bool("HOSTED_MODE_ENABLED", false),
        }
    }

    /// Get sync timeout duration
    pub fn sync_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Get conflict requeue duration
    pub fn conflict_requeue_duration(&self) -> Duration {
        Duration::from_millis(self.conflict_requeue_ms)
    }

    /// Tracing filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        format!("addon_deploy_controller={}", self.log_level.to_lowercase())
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
