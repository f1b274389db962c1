//! Wire-facing request and response envelopes for the service facade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::{ContentType, Platform};
use crate::messaging::ExecutionStatus;
use crate::orchestration::WorkflowSnapshot;

/// Acknowledgement for an accepted publication request; work continues
/// on the queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub request_id: Uuid,
    pub status: String,
}

impl AcceptedResponse {
    pub fn accepted(request_id: Uuid) -> Self {
        Self {
            request_id,
            status: "accepted".to_string(),
        }
    }
}

/// Acknowledgement for a standalone crop submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropSubmission {
    pub task_id: Uuid,
    pub status: String,
}

impl CropSubmission {
    pub fn submitted(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: "submitted".to_string(),
        }
    }
}

/// Standalone image adaptation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedCropRequest {
    pub s3_url: String,
    pub platform: Platform,
    #[serde(default)]
    pub content_type: ContentType,
    /// Recompute even when a cached result exists.
    #[serde(default)]
    pub force_refresh: bool,
}

/// What a tracking id resolved to: a workflow or a standalone crop task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowStatusView {
    Workflow(WorkflowSnapshot),
    Crop(ExecutionStatus),
}

/// One queue with its worker pool, as reported by `queue_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueWorkerStatus {
    pub queue_name: String,
    pub depth: usize,
    pub enqueued_total: u64,
    pub workers: usize,
    pub running: bool,
}

/// Full queue-side picture of the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub running: bool,
    pub queues: Vec<QueueWorkerStatus>,
}

/// Static liveness payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub components: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            components: vec![
                "orchestrator".to_string(),
                "queues".to_string(),
                "drafts".to_string(),
                "crop_engine".to_string(),
            ],
            timestamp: Utc::now(),
        }
    }
}
