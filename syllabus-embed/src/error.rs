//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Embedding calls are never retried, so every variant reaches the caller of
/// the operation that triggered it. Configuration problems are separated from
/// failures of the upstream service so callers can tell "never going to work"
/// from "this call failed".
///
/// # Error Categories
///
/// - **Configuration Errors**: missing credential, zero dimension, bad URL
/// - **Transport Errors**: connection refused, TLS, timeouts
/// - **API Errors**: non-success HTTP status from the provider
/// - **Response Errors**: unparseable bodies or vectors of the wrong length
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the provider configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The HTTP request could not be completed
    #[error("Embedding request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status
    #[error("Embedding API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered with a body that does not match the expected shape
    #[error("Malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// A returned vector does not have the configured length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed response error with a custom message.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether the error comes from configuration rather than from a call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}
