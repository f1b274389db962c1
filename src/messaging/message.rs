//! # Queue Message Structures
//!
//! Message formats for the in-process task queues. One [`TaskMessage`] is
//! one unit of work for a worker: a pipeline stage of a platform task or a
//! standalone crop submission.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{defaults, queues};

/// Which pipeline stage a message belongs to; selects its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    ContentGeneration,
    ContentFormatting,
    ContentPublishing,
    ImageAdaptation,
}

impl TaskCategory {
    pub fn queue_name(&self) -> &'static str {
        match self {
            TaskCategory::ContentGeneration => queues::CONTENT_GENERATION,
            TaskCategory::ContentFormatting => queues::CONTENT_FORMATTING,
            TaskCategory::ContentPublishing => queues::CONTENT_PUBLISHING,
            TaskCategory::ImageAdaptation => queues::IMAGE_ADAPTATION,
        }
    }

    /// Stages safe to re-run without external side effects get the full
    /// retry budget; publishing is capped separately.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, TaskCategory::ContentPublishing)
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.queue_name())
    }
}

/// Metadata carried by every queue message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// When the message was first enqueued.
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    /// Current retry count.
    pub retry_count: u32,
    /// Maximum retry attempts.
    pub max_retries: u32,
    /// Execution timeout in milliseconds.
    pub timeout_ms: u64,
    /// Correlation ID for tracing a message across stages.
    pub correlation_id: Option<String>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            enqueued_at: chrono::Utc::now(),
            retry_count: 0,
            max_retries: defaults::MAX_RETRY_ATTEMPTS,
            timeout_ms: defaults::TASK_TIMEOUT_SECONDS * 1000,
            correlation_id: Some(Uuid::new_v4().to_string()),
        }
    }
}

/// Unit of work delivered to a queue worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Platform task (or standalone crop task) this message advances.
    pub task_id: Uuid,
    /// Owning workflow; equals `task_id` for standalone submissions.
    pub workflow_id: Uuid,
    pub category: TaskCategory,
    /// Stage-specific payload.
    pub payload: serde_json::Value,
    pub metadata: MessageMetadata,
}

impl TaskMessage {
    pub fn new(
        task_id: Uuid,
        workflow_id: Uuid,
        category: TaskCategory,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            task_id,
            workflow_id,
            category,
            payload,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn with_metadata(
        task_id: Uuid,
        workflow_id: Uuid,
        category: TaskCategory,
        payload: serde_json::Value,
        metadata: MessageMetadata,
    ) -> Self {
        Self {
            task_id,
            workflow_id,
            category,
            payload,
            metadata,
        }
    }

    /// Queue this message belongs on.
    pub fn queue_name(&self) -> &'static str {
        self.category.queue_name()
    }

    pub fn increment_retry(&mut self) {
        self.metadata.retry_count += 1;
    }

    pub fn is_max_retries_exceeded(&self) -> bool {
        self.metadata.retry_count >= self.metadata.max_retries
    }

    /// Whether the message outlived its own timeout while queued.
    pub fn is_expired(&self) -> bool {
        self.age_ms() > self.metadata.timeout_ms
    }

    pub fn age_ms(&self) -> u64 {
        chrono::Utc::now()
            .signed_duration_since(self.metadata.enqueued_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
