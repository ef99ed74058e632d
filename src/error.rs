//! Error types shared by the external-service clients and answer backends.

use reqwest::StatusCode;

/// Failure of a single call to an external service (embeddings, vector
/// database, web search).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Required credentials or endpoints are missing.
    #[error("{service} is not configured: {reason}")]
    Unconfigured {
        /// Service name used in log lines.
        service: &'static str,
        /// What is missing.
        reason: String,
    },

    /// The request never produced a response (connect error, timeout, ...).
    #[error("{service} request failed: {source}")]
    Transport {
        /// Service name used in log lines.
        service: &'static str,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Status {
        /// Service name used in log lines.
        service: &'static str,
        /// HTTP status.
        status: StatusCode,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode {service} response: {message}")]
    Decode {
        /// Service name used in log lines.
        service: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The embedding backend returned a vector of the wrong size.
    #[error("expected {expected}-dimensional embedding, got {actual}")]
    Dimension {
        /// Configured dimensionality.
        expected: usize,
        /// Dimensionality actually returned.
        actual: usize,
    },
}

impl ServiceError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            ServiceError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Reason an answer could not be composed.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The selected backend has no credentials or endpoint.
    #[error("{backend} backend unavailable")]
    Unavailable {
        /// Backend name.
        backend: &'static str,
    },

    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] ServiceError),

    /// The backend answered without any text.
    #[error("{backend} returned an empty answer")]
    EmptyResponse {
        /// Backend name.
        backend: &'static str,
    },
}
