//! # Orchestration Types
//!
//! Shared types for the orchestration layer: read-only snapshots served to
//! status callers, fleet-level metrics, and the payload/message helpers the
//! orchestrator and queue handlers both build stage messages from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::{ContentType, Platform, SiteWeb};
use crate::config::TaskSettings;
use crate::error::Result;
use crate::messaging::{MessageMetadata, TaskCategory, TaskMessage};
use crate::models::{PlatformTask, Workflow};
use crate::state_machine::{TaskState, WorkflowState};

/// Read-only view of one platform task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub status: TaskState,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    pub fn from_task(task: &PlatformTask) -> Self {
        Self {
            task_id: task.id,
            platform: task.platform,
            content_type: task.content_type,
            status: task.status,
            retry_count: task.retry_count,
            result: task.result.clone(),
            error: task.error.clone(),
            created_at: task.created_at,
            completed_at: task.completed_at,
        }
    }
}

/// Read-only view of one workflow; status is recomputed from the tasks at
/// snapshot time, never read from the cached projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub workflow_id: Uuid,
    pub site: SiteWeb,
    pub status: WorkflowState,
    pub platform_tasks: Vec<TaskSnapshot>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl WorkflowSnapshot {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.id,
            site: workflow.request.site_web,
            status: workflow.aggregate_status(),
            platform_tasks: workflow
                .platform_tasks
                .iter()
                .map(TaskSnapshot::from_task)
                .collect(),
            created_at: workflow.created_at,
            completed_at: workflow.completed_at,
            cancelled_at: workflow.cancelled_at,
        }
    }

    pub fn task(&self, task_id: Uuid) -> Option<&TaskSnapshot> {
        self.platform_tasks.iter().find(|t| t.task_id == task_id)
    }
}

/// Fleet-level counters over every stored workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    pub total_workflows: usize,
    /// Workflow count per aggregate status name.
    pub status_counts: HashMap<String, usize>,
    /// Workflow count per site.
    pub site_counts: HashMap<String, usize>,
    /// Platform task count per platform.
    pub platform_counts: HashMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

impl WorkflowMetrics {
    pub fn from_workflows(workflows: &[Workflow]) -> Self {
        let mut status_counts: HashMap<String, usize> = HashMap::new();
        let mut site_counts: HashMap<String, usize> = HashMap::new();
        let mut platform_counts: HashMap<String, usize> = HashMap::new();

        for workflow in workflows {
            *status_counts
                .entry(workflow.aggregate_status().to_string())
                .or_insert(0) += 1;
            *site_counts
                .entry(workflow.request.site_web.as_str().to_string())
                .or_insert(0) += 1;
            for task in &workflow.platform_tasks {
                *platform_counts
                    .entry(task.platform.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }

        Self {
            total_workflows: workflows.len(),
            status_counts,
            site_counts,
            platform_counts,
            generated_at: Utc::now(),
        }
    }
}

/// Stage message payload. Both variants travel on the image adaptation
/// queue; the other queues only ever see `Pipeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Stage of a workflow-owned platform task; everything the stage needs
    /// lives on the task record.
    Pipeline,
    /// Image adaptation submitted outside any workflow.
    StandaloneCrop {
        source: String,
        platform: Platform,
        content_type: ContentType,
        force_refresh: bool,
    },
}

/// Build a stage message with the retry budget of its category stamped in.
/// `max_retries` counts re-deliveries beyond the first attempt: idempotent
/// stages get `max_retry_attempts` total attempts, publishing gets only the
/// configured extra attempts beyond the first. The workflow id doubles as
/// correlation id so one workflow's stages share a trace key.
pub fn stage_message(
    task_id: Uuid,
    workflow_id: Uuid,
    category: TaskCategory,
    payload: &TaskPayload,
    settings: &TaskSettings,
) -> Result<TaskMessage> {
    let max_retries = if category.is_idempotent() {
        settings.max_retry_attempts.saturating_sub(1)
    } else {
        settings.publish_extra_retries
    };
    let metadata = MessageMetadata {
        enqueued_at: Utc::now(),
        retry_count: 0,
        max_retries,
        timeout_ms: settings.timeout_seconds * 1000,
        correlation_id: Some(workflow_id.to_string()),
    };

    Ok(TaskMessage::with_metadata(
        task_id,
        workflow_id,
        category,
        serde_json::to_value(payload)?,
        metadata,
    ))
}
