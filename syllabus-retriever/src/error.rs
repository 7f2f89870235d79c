//! Error types for the retrieval layer

use syllabus_embed::EmbedError;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error type for all retrieval operations.
///
/// Errors fall into two groups. [`RetrievalError::NotReady`] means a
/// precondition is unmet: the vector index was disabled at startup and every
/// indexing call will keep failing the same way. Everything coming from the
/// embedding provider or the vector backend is an upstream failure of one
/// call. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The vector index is disabled for the lifetime of this client
    #[error("Vector index not ready: {reason}")]
    NotReady { reason: String },

    /// The embedding provider failed
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// A call to the vector backend failed
    #[error("Vector backend {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A text-producing collaborator failed
    #[error("Text source failed: {source}")]
    Source {
        #[source]
        source: anyhow::Error,
    },

    /// A vector does not match the collection dimension
    #[error("Vector has {actual} dimensions, collection expects {expected}")]
    InvalidVector { expected: usize, actual: usize },

    /// The caller passed an argument that can never succeed
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl RetrievalError {
    pub fn not_ready<S: Into<String>>(reason: S) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }

    pub fn backend(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Backend { operation, source }
    }

    pub fn text_source(source: anyhow::Error) -> Self {
        Self::Source { source }
    }

    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Precondition failure: retrying will not help until the configuration changes.
    ///
    /// An embedding provider that rejects its own configuration counts here too.
    pub fn is_not_ready(&self) -> bool {
        match self {
            Self::NotReady { .. } => true,
            Self::Embedding(e) => e.is_config(),
            _ => false,
        }
    }

    /// Operational failure of a single call to a collaborator: embedding
    /// provider, vector backend or text source.
    pub fn is_upstream(&self) -> bool {
        match self {
            Self::Backend { .. } | Self::Source { .. } => true,
            Self::Embedding(e) => !e.is_config(),
            _ => false,
        }
    }
}
