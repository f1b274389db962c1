//! # Lifecycle Events
//!
//! Advisory broadcast of workflow, task, draft, and crop transitions.
//! Subscribers are optional; publishing never blocks or fails the pipeline.

pub mod publisher;

// Re-export key types for convenience
pub use publisher::{EventPublisher, PublishedEvent};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::Platform;
use crate::constants::events;
use crate::state_machine::TaskState;

/// Lifecycle events published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PublicationEvent {
    WorkflowCreated {
        workflow_id: Uuid,
        platform_count: usize,
    },
    WorkflowCompleted {
        workflow_id: Uuid,
        status: String,
    },
    WorkflowCancelled {
        workflow_id: Uuid,
    },
    TaskStarted {
        task_id: Uuid,
        workflow_id: Uuid,
        platform: Platform,
    },
    TaskCompleted {
        task_id: Uuid,
        workflow_id: Uuid,
        platform: Platform,
    },
    TaskFailed {
        task_id: Uuid,
        workflow_id: Uuid,
        platform: Platform,
        error: String,
        final_state: TaskState,
    },
    TaskRetryScheduled {
        task_id: Uuid,
        workflow_id: Uuid,
        retry_count: u32,
        delay_seconds: u64,
    },
    DraftCreated {
        draft_id: Uuid,
        platform: Platform,
        simulated: bool,
    },
    DraftPublished {
        draft_id: Uuid,
        workflow_id: Option<Uuid>,
    },
    DraftDeleted {
        draft_id: Uuid,
    },
    CropCompleted {
        cache_key: String,
        strategy: String,
    },
    CropFailed {
        cache_key: String,
        error: String,
    },
}

impl PublicationEvent {
    /// Stable event name used in logs and subscriber filtering.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkflowCreated { .. } => events::WORKFLOW_CREATED,
            Self::WorkflowCompleted { .. } => events::WORKFLOW_COMPLETED,
            Self::WorkflowCancelled { .. } => events::WORKFLOW_CANCELLED,
            Self::TaskStarted { .. } => events::TASK_STARTED,
            Self::TaskCompleted { .. } => events::TASK_COMPLETED,
            Self::TaskFailed { .. } => events::TASK_FAILED,
            Self::TaskRetryScheduled { .. } => events::TASK_RETRY_SCHEDULED,
            Self::DraftCreated { .. } => events::DRAFT_CREATED,
            Self::DraftPublished { .. } => events::DRAFT_PUBLISHED,
            Self::DraftDeleted { .. } => events::DRAFT_DELETED,
            Self::CropCompleted { .. } => events::CROP_COMPLETED,
            Self::CropFailed { .. } => events::CROP_FAILED,
        }
    }
}
