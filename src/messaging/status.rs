//! Execution status tracking for queue-delivered work.
//!
//! Workflow-owned tasks keep their state on the workflow record; this
//! store covers work submitted outside a workflow (standalone crop
//! submissions) so status reads have somewhere to look those ids up.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::messaging::message::TaskCategory;
use crate::state_machine::TaskState;

/// Latest known execution state of one queue-delivered task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub task_id: Uuid,
    pub category: TaskCategory,
    pub state: TaskState,
    pub retry_count: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent map of task id to latest execution status.
#[derive(Debug, Default)]
pub struct ExecutionStatusStore {
    statuses: DashMap<Uuid, ExecutionStatus>,
}

impl ExecutionStatusStore {
    pub fn new() -> Self {
        Self {
            statuses: DashMap::new(),
        }
    }

    /// Register a task at submission time.
    pub fn mark_pending(&self, task_id: Uuid, category: TaskCategory) {
        self.statuses.insert(
            task_id,
            ExecutionStatus {
                task_id,
                category,
                state: TaskState::Pending,
                retry_count: 0,
                result: None,
                error: None,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn mark_processing(&self, task_id: Uuid) {
        self.update(task_id, |status| {
            status.state = TaskState::Processing;
        });
    }

    /// Back to pending with the retry counted; used when a failed attempt
    /// still has retries left.
    pub fn mark_retrying(&self, task_id: Uuid, retry_count: u32) {
        self.update(task_id, |status| {
            status.state = TaskState::Pending;
            status.retry_count = retry_count;
        });
    }

    pub fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) {
        self.update(task_id, |status| {
            status.state = TaskState::Completed;
            status.result = Some(result);
            status.error = None;
        });
    }

    pub fn mark_failed(&self, task_id: Uuid, error: impl Into<String>) {
        let error = error.into();
        self.update(task_id, move |status| {
            status.state = TaskState::Failed;
            status.error = Some(error);
        });
    }

    pub fn get(&self, task_id: Uuid) -> Option<ExecutionStatus> {
        self.statuses.get(&task_id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    fn update(&self, task_id: Uuid, apply: impl FnOnce(&mut ExecutionStatus)) {
        match self.statuses.get_mut(&task_id) {
            Some(mut entry) => {
                apply(&mut entry);
                entry.updated_at = Utc::now();
            }
            None => debug!(task_id = %task_id, "Status update for unknown task"),
        }
    }
}
