//! # Error Handling
//!
//! Crate-wide error taxonomy using thiserror for structured error types
//! instead of `Box<dyn Error>` patterns. Component modules keep their own
//! error enums and convert into [`CrosspostError`] at the crate boundary, so
//! every failure stays attributed to the platform task, crop job, or draft
//! it originated from.

use thiserror::Error;
use uuid::Uuid;

/// Unified error type for the publication system.
#[derive(Error, Debug, Clone)]
pub enum CrosspostError {
    /// Malformed request, rejected before any task is created.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// No credentials configured for a (site, platform) pair.
    #[error("Credentials not configured for {site}/{platform}")]
    Credentials { site: String, platform: String },

    /// Source image could not be decoded; fatal for the whole crop job.
    #[error("Image decode failed for {image_source}: {message}")]
    ImageDecode {
        image_source: String,
        message: String,
    },

    /// A single crop strategy failed; recoverable, the chain advances.
    #[error("Crop strategy '{strategy}' failed: {message}")]
    Strategy { strategy: String, message: String },

    /// External platform API failure (auth expiry, rate limit, outage).
    #[error("Platform API error on {platform}: {message}")]
    PlatformApi {
        platform: String,
        message: String,
        retryable: bool,
        retry_after_seconds: Option<u64>,
    },

    /// Task execution exceeded its configured timeout.
    #[error("Operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    /// Draft has already left the `draft` state via publication.
    #[error("Draft {draft_id} is already published")]
    DraftAlreadyPublished { draft_id: Uuid },

    /// Draft id unknown, or the draft was deleted.
    #[error("Draft {draft_id} not found")]
    DraftNotFound { draft_id: String },

    /// Re-submission of an existing workflow id.
    #[error("Workflow {workflow_id} already exists")]
    DuplicateWorkflow { workflow_id: Uuid },

    /// Workflow id unknown.
    #[error("Workflow {workflow_id} not found")]
    WorkflowNotFound { workflow_id: String },

    /// Queue submit/dispatch failure.
    #[error("Queue operation failed: {queue_name}: {message}")]
    QueueOperation { queue_name: String, message: String },

    /// No adapter registered for a platform.
    #[error("No {kind} adapter registered for platform {platform}")]
    AdapterNotRegistered { kind: String, platform: String },

    /// Invalid configuration value.
    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    /// Catch-all for unexpected internal failures.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CrosspostError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a credentials error
    pub fn credentials(site: impl Into<String>, platform: impl Into<String>) -> Self {
        Self::Credentials {
            site: site.into(),
            platform: platform.into(),
        }
    }

    /// Create an image decode error
    pub fn image_decode(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImageDecode {
            image_source: source.into(),
            message: message.into(),
        }
    }

    /// Create a strategy error
    pub fn strategy(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Create a platform API error
    pub fn platform_api(
        platform: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
        retry_after_seconds: Option<u64>,
    ) -> Self {
        Self::PlatformApi {
            platform: platform.into(),
            message: message.into(),
            retryable,
            retry_after_seconds,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_seconds,
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the standard retry policy applies to this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PlatformApi { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            Self::QueueOperation { .. } => true,
            Self::Strategy { .. } => true,
            _ => false,
        }
    }

    /// Server-provided retry-after hint, if the failure carried one.
    pub fn retry_after_hint(&self) -> Option<u64> {
        match self {
            Self::PlatformApi {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }

    /// HTTP status code the service facade maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::DraftNotFound { .. } | Self::WorkflowNotFound { .. } => 404,
            Self::DraftAlreadyPublished { .. } | Self::DuplicateWorkflow { .. } => 409,
            Self::Credentials { .. } => 422,
            Self::Timeout { .. } => 504,
            _ => 500,
        }
    }

    /// Stable machine-readable kind name for result records and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Credentials { .. } => "credentials_error",
            Self::ImageDecode { .. } => "image_decode_error",
            Self::Strategy { .. } => "strategy_error",
            Self::PlatformApi { .. } => "platform_api_error",
            Self::Timeout { .. } => "timeout_error",
            Self::DraftAlreadyPublished { .. } => "draft_already_published_error",
            Self::DraftNotFound { .. } => "draft_not_found_error",
            Self::DuplicateWorkflow { .. } => "duplicate_workflow_error",
            Self::WorkflowNotFound { .. } => "workflow_not_found_error",
            Self::QueueOperation { .. } => "queue_error",
            Self::AdapterNotRegistered { .. } => "adapter_not_registered_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<serde_json::Error> for CrosspostError {
    fn from(err: serde_json::Error) -> Self {
        CrosspostError::internal(format!("JSON serialization failed: {err}"))
    }
}

impl From<String> for CrosspostError {
    fn from(message: String) -> Self {
        CrosspostError::internal(message)
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, CrosspostError>;
