//! Error types for the control plane machine set operator

use thiserror::Error;

use crate::crd::PlatformType;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error on a write
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Reading cluster state failed; the pass is retried by the work queue
    #[error("failed to read {resource}: {source}")]
    TransientRead {
        resource: String,
        #[source]
        source: kube::Error,
    },

    /// The resource changed between fetch and commit
    #[error("conflict committing {0}: resource was modified")]
    Conflict(String),

    /// Raw provider payload does not match the schema of its declared platform
    #[error("could not decode {platform} provider config: {source}")]
    ConfigDecode {
        platform: PlatformType,
        #[source]
        source: serde_json::Error,
    },

    /// A lookup the caller expected to succeed found nothing
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// A failure domain of one platform was applied to another platform's config
    #[error("cannot apply {found} failure domain to {expected} provider config")]
    FailureDomainMismatch {
        expected: PlatformType,
        found: PlatformType,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether requeueing the pass without a spec change can succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_) | Error::TransientRead { .. } | Error::Conflict(_) => true,
            Error::ConfigDecode { .. }
            | Error::Lookup(_)
            | Error::FailureDomainMismatch { .. }
            | Error::ValidationError(_)
            | Error::InvalidSelector(_)
            | Error::SerializationError(_)
            | Error::ConfigError(_) => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Map a write failure, surfacing HTTP 409 as [`Error::Conflict`]
    pub fn from_write(what: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 409 => {
                Error::Conflict(what.to_string())
            }
            other => Error::KubeError(other),
        }
    }

    pub fn read(resource: impl Into<String>, source: kube::Error) -> Self {
        Error::TransientRead {
            resource: resource.into(),
            source,
        }
    }
}
