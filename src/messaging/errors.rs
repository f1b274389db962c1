//! # Messaging Error Types
//!
//! Structured error handling for the queue layer using thiserror instead
//! of `Box<dyn Error>` patterns. Queue errors convert into the crate-level
//! [`CrosspostError`] at the orchestration boundary.

use thiserror::Error;

use crate::error::CrosspostError;

/// Queue layer error types
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Send to queue failed: {queue_name}: {message}")]
    SendFailed { queue_name: String, message: String },

    #[error("Receiver for queue {queue_name} was already taken")]
    ReceiverTaken { queue_name: String },

    #[error("Worker pool for queue {queue_name} is already running")]
    AlreadyRunning { queue_name: String },

    #[error("Worker pool for queue {queue_name} did not stop within {timeout_seconds}s")]
    ShutdownTimeout {
        queue_name: String,
        timeout_seconds: u64,
    },

    #[error("Message serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    /// Create a send failed error
    pub fn send_failed(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SendFailed {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create a receiver taken error
    pub fn receiver_taken(queue_name: impl Into<String>) -> Self {
        Self::ReceiverTaken {
            queue_name: queue_name.into(),
        }
    }

    /// Create an already running error
    pub fn already_running(queue_name: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            queue_name: queue_name.into(),
        }
    }

    /// Create a shutdown timeout error
    pub fn shutdown_timeout(queue_name: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::ShutdownTimeout {
            queue_name: queue_name.into(),
            timeout_seconds,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    fn queue_name(&self) -> &str {
        match self {
            Self::QueueNotFound { queue_name }
            | Self::SendFailed { queue_name, .. }
            | Self::ReceiverTaken { queue_name }
            | Self::AlreadyRunning { queue_name }
            | Self::ShutdownTimeout { queue_name, .. } => queue_name,
            Self::Serialization { .. } | Self::Internal { .. } => "unknown",
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<QueueError> for CrosspostError {
    fn from(err: QueueError) -> Self {
        CrosspostError::queue_operation(err.queue_name().to_string(), err.to_string())
    }
}

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
