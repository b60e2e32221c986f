//! Router Error Taxonomy
//!
//! Every failure a single generation request can hit. All variants are
//! terminal for the request that raised them; none are retried. The request
//! handler converts each one into exactly one outward error notice.

use thiserror::Error;

/// Errors raised while serving a generation request
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The configuration sidecar could not be reached or answered with a failure
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),

    /// The policy document could not be parsed or failed validation
    #[error("configuration malformed: {0}")]
    ConfigMalformed(String),

    /// The backend invocation could not be started (auth, quota, unknown model)
    #[error("backend invocation failed to open: {0}")]
    BackendOpenFailure(String),

    /// The backend failed while chunks were being delivered
    #[error("backend stream failed: {0}")]
    BackendStreamFailure(String),

    /// A backend chunk payload could not be decoded
    #[error("chunk decode failed: {0}")]
    ChunkDecodeError(String),
}

impl RouterError {
    /// Stable snake_case label for this error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigUnavailable(_) => "config_unavailable",
            Self::ConfigMalformed(_) => "config_malformed",
            Self::BackendOpenFailure(_) => "backend_open_failure",
            Self::BackendStreamFailure(_) => "backend_stream_failure",
            Self::ChunkDecodeError(_) => "chunk_decode_error",
        }
    }

    /// The detail message without the kind prefix
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::ConfigUnavailable(d)
            | Self::ConfigMalformed(d)
            | Self::BackendOpenFailure(d)
            | Self::BackendStreamFailure(d)
            | Self::ChunkDecodeError(d) => d,
        }
    }

    /// Whether this error happened before a model could be selected
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigUnavailable(_) | Self::ConfigMalformed(_))
    }
}

/// Convenience alias for router results
pub type RouterResult<T> = Result<T, RouterError>;
