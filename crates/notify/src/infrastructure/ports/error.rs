//! Error types for port operations.

/// Key-value storage errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend I/O failed - includes operation name for tracing.
    #[error("Storage error in {operation}: {message}")]
    Io {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Create an Io error with operation context.
    pub fn io(operation: &'static str, message: impl ToString) -> Self {
        Self::Io {
            operation,
            message: message.to_string(),
        }
    }

    /// Create a Serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }
}

/// Toast/badge primitive failures. Always logged and swallowed by the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PresentationError {
    #[error("Presenter unavailable: {0}")]
    Unavailable(String),
    #[error("Presentation failed: {0}")]
    Failed(String),
}
