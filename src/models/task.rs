//! # Platform Tasks
//!
//! The unit of work for one platform inside a workflow. Task ids are UUIDv5
//! values derived from `(workflow_id, platform[, slide_index])`, so
//! re-submitting the same logical task reproduces the same id and retries
//! never mint new identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::{ContentType, Platform};
use crate::error::CrosspostError;
use crate::state_machine::TaskState;

/// Unit of work for publishing/formatting/cropping on one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformTask {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub status: TaskState,
    pub retry_count: u32,
    /// Terminal payload: platform post reference, draft id, or adapted-image
    /// references, depending on how the task ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    // Interim artifacts carried between pipeline stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapted_images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_draft_id: Option<Uuid>,
}

impl PlatformTask {
    /// Deterministic task id for a `(workflow, platform[, slide])` triple.
    pub fn deterministic_id(
        workflow_id: Uuid,
        platform: Platform,
        slide_index: Option<u32>,
    ) -> Uuid {
        let name = match slide_index {
            Some(index) => format!("{platform}:{index}"),
            None => platform.to_string(),
        };
        Uuid::new_v5(&workflow_id, name.as_bytes())
    }

    pub fn new(workflow_id: Uuid, platform: Platform, content_type: ContentType) -> Self {
        Self {
            id: Self::deterministic_id(workflow_id, platform, None),
            workflow_id,
            platform,
            content_type,
            status: TaskState::Pending,
            retry_count: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            formatted_content: None,
            adapted_images: None,
            staged_draft_id: None,
        }
    }

    /// Task that failed before ever being enqueued, e.g. missing
    /// credentials. Siblings are unaffected.
    pub fn failed_immediately(
        workflow_id: Uuid,
        platform: Platform,
        content_type: ContentType,
        error: &CrosspostError,
    ) -> Self {
        let mut task = Self::new(workflow_id, platform, content_type);
        task.status = TaskState::Failed;
        task.error = Some(format!("{}: {error}", error.kind()));
        task.completed_at = Some(Utc::now());
        task
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_processing(&mut self) {
        self.status = TaskState::Processing;
    }

    /// Return the task to the retry pool with its attempt counter bumped.
    pub fn mark_retry_pending(&mut self, error: &CrosspostError) {
        self.retry_count += 1;
        self.status = TaskState::Pending;
        self.error = Some(format!("{}: {error}", error.kind()));
    }

    pub fn mark_completed(&mut self, result: serde_json::Value) {
        self.status = TaskState::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: &CrosspostError) {
        self.status = TaskState::Failed;
        self.error = Some(format!("{}: {error}", error.kind()));
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = TaskState::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}
