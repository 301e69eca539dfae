//! # Errors
//!
//! Error types for the addon deploy engine.

use thiserror::Error;

/// Errors raised while turning a manifest set into ManifestWorks
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid install mode {0:?}")]
    InvalidInstallMode(String),

    #[error("invalid hosted manifest location {value:?} on {manifest}")]
    InvalidManifestLocation { manifest: String, value: String },

    #[error("manifest {index} is {size} bytes, exceeding the limit of {limit} bytes")]
    ManifestTooLarge {
        index: usize,
        size: usize,
        limit: usize,
    },

    #[error("pre-delete hook manifests are {size} bytes, exceeding the limit of {limit} bytes")]
    HookTooLarge { size: usize, limit: usize },

    #[error("addon returned no manifests while {existing} manifestworks are deployed")]
    EmptyManifests { existing: usize },

    #[error("work namespace {namespace} does not match cluster {cluster}")]
    NamespaceMismatch { namespace: String, cluster: String },

    #[error("failed to serialize manifest: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("failed to get manifests of addon {addon}: {source}")]
    Manifests {
        addon: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to serialize patch: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<DeployError>),

    #[error("sync of {key} did not finish within {secs}s")]
    Timeout { key: String, secs: u64 },
}

fn format_aggregate(errors: &[DeployError]) -> String {
    let parts: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

impl DeployError {
    /// Fold a list of errors into a single result.
    ///
    /// Nested aggregates are flattened; a single error is returned as-is.
    pub fn aggregate(errors: Vec<DeployError>) -> Result<(), DeployError> {
        let mut flat = Vec::with_capacity(errors.len());
        for err in errors {
            match err {
                DeployError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(DeployError::Aggregate(flat)),
        }
    }

    /// Optimistic concurrency conflict (HTTP 409) anywhere in the error
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            DeployError::Kube(kube::Error::Api(e)) => e.code == 409,
            DeployError::Aggregate(errors) => errors.iter().any(DeployError::is_conflict),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeployError::Timeout { .. })
    }
}

#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}
