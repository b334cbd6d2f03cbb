//! Error types for port operations.

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Entity not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Store operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Business constraint violated (e.g. a duplicate name).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl RepoError {
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    pub fn constraint(message: impl ToString) -> Self {
        Self::ConstraintViolation(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Saga submission failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SagaError {
    #[error("Saga submission failed: {0}")]
    Submission(String),
    #[error("Saga has no steps")]
    Empty,
}

/// Failures talking to a peer service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PeerError {
    #[error("Peer request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid peer response: {0}")]
    InvalidResponse(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Peer service unavailable")]
    Unavailable,
}

/// Failures handing messages to a topic.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProducerError {
    #[error("Failed to encode message: {0}")]
    Encode(String),
    #[error("Topic {0} is closed")]
    Closed(String),
}

impl From<serde_json::Error> for ProducerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}
