//! # Error Policy
//!
//! Requeue decisions for failed syncs and classification of controller
//! stream errors.

use crate::controller::addon_deploy::DeployError;
use crate::crd::ManagedClusterAddOn;
use crate::observability;
use crate::runtime::context::Context;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed sync.
///
/// Conflicts are retried after a short fixed delay since the cache is simply
/// behind. Everything else backs off per addon with a Fibonacci sequence that
/// is reset on the next success.
pub fn handle_sync_error(
    obj: Arc<ManagedClusterAddOn>,
    error: &DeployError,
    ctx: Arc<Context>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.sync_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    if error.is_conflict() {
        let delay = ctx.config.conflict_requeue_duration();
        info!(
            "Conflict while syncing {}/{}, requeueing in {}ms",
            namespace,
            name,
            delay.as_millis()
        );
        observability::metrics::increment_requeues_total("conflict");
        return Action::requeue(delay);
    }

    error!("Sync error for {}/{}: {}", namespace, name, error);

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = ctx
        .next_backoff(&resource_key)
        .unwrap_or((ctx.config.backoff_max_secs, 0));

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        backoff_seconds, error_count
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    Unauthorized,
    Expired,
    TooManyRequests,
    NotFound,
    Other,
}

/// Classify a controller stream error by its rendered text
#[must_use]
pub fn classify_stream_error(error_string: &str) -> StreamErrorKind {
    // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
        StreamErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
    {
        StreamErrorKind::Expired
    } else if error_string.contains("429") || error_string.contains("TooManyRequests") {
        StreamErrorKind::TooManyRequests
    } else if is_not_found {
        StreamErrorKind::NotFound
    } else {
        StreamErrorKind::Other
    }
}

/// Log a controller stream error at a severity matching its kind
pub fn log_stream_error(error_string: &str) {
    match classify_stream_error(error_string) {
        StreamErrorKind::Unauthorized => error!(
            "Watch authentication failed (401 Unauthorized) - check the controller's RBAC: {}",
            error_string
        ),
        StreamErrorKind::Expired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
        }
        StreamErrorKind::TooManyRequests => {
            warn!("API server is throttling watches (429): {}", error_string);
        }
        StreamErrorKind::NotFound => warn!(
            "Resource not found (404) - is the addon, cluster or work CRD installed? {}",
            error_string
        ),
        StreamErrorKind::Other => error!("Controller stream error: {}", error_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stream_error() {
        assert_eq!(
            classify_stream_error("ApiError: Unauthorized (401)"),
            StreamErrorKind::Unauthorized
        );
        assert_eq!(
            classify_stream_error("WatchFailed: invalid type: integer `404`"),
            StreamErrorKind::NotFound
        );
        assert_eq!(
            classify_stream_error("too old resource version: 123 (456)"),
            StreamErrorKind::Expired
        );
        assert_eq!(
            classify_stream_error("TooManyRequests: storage is (re)initializing"),
            StreamErrorKind::TooManyRequests
        );
        assert_eq!(classify_stream_error("connection reset"), StreamErrorKind::Other);
    }
}
