//! # Workflows
//!
//! One publication request's aggregate: the request, its platform tasks, and
//! a status that is always a pure function of the child task states. The
//! stored status field is a cached projection; readers recompute through
//! [`Workflow::aggregate_status`] so a workflow can never report completion
//! while a child is still in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::EnhancedPublishRequest;
use crate::models::task::PlatformTask;
use crate::state_machine::{TaskState, WorkflowState};

/// Aggregate for one publication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub request: EnhancedPublishRequest,
    pub platform_tasks: Vec<PlatformTask>,
    /// Cached projection only; recomputed from tasks on every read.
    pub status: WorkflowState,
    /// Base content shared by all platform tasks, produced by the generation
    /// stage (or the source text when no generator is registered).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_content: Option<String>,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(id: Uuid, request: EnhancedPublishRequest) -> Self {
        Self {
            id,
            request,
            platform_tasks: Vec::new(),
            status: WorkflowState::Pending,
            base_content: None,
            cancelled: false,
            created_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Pure aggregation over child task states.
    ///
    /// Order matters: any non-terminal child forces `Processing`, so a
    /// failure is never reported while siblings are still in flight.
    /// `Completed` requires every child to have completed.
    pub fn aggregate(tasks: &[PlatformTask]) -> WorkflowState {
        if tasks.is_empty() {
            return WorkflowState::Pending;
        }
        if tasks.iter().any(|t| !t.status.is_terminal()) {
            return WorkflowState::Processing;
        }
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskState::Completed)
            .count();
        if completed == tasks.len() {
            WorkflowState::Completed
        } else if completed == 0 {
            WorkflowState::Failed
        } else {
            WorkflowState::PartialFailure
        }
    }

    /// Current status including the cancellation override: once cancelled,
    /// late task results are recorded on the tasks but ignored here.
    pub fn aggregate_status(&self) -> WorkflowState {
        if self.cancelled {
            return WorkflowState::Cancelled;
        }
        Self::aggregate(&self.platform_tasks)
    }

    /// Recompute and cache the projection, stamping `completed_at` on the
    /// first transition into a terminal aggregate.
    pub fn refresh_status(&mut self) {
        let status = self.aggregate_status();
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.status = status;
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
        if self.cancelled_at.is_none() {
            self.cancelled_at = Some(Utc::now());
        }
        self.status = WorkflowState::Cancelled;
    }

    pub fn task(&self, task_id: Uuid) -> Option<&PlatformTask> {
        self.platform_tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: Uuid) -> Option<&mut PlatformTask> {
        self.platform_tasks.iter_mut().find(|t| t.id == task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{ContentType, Platform, SiteWeb};
    use crate::error::CrosspostError;
    use crate::models::request::PlatformConfig;
    use proptest::prelude::*;

    fn test_request() -> EnhancedPublishRequest {
        EnhancedPublishRequest {
            texte_source: "texte".to_string(),
            site_web: SiteWeb::Gaming,
            platforms_config: vec![PlatformConfig::new(Platform::Twitter, ContentType::Post)],
            published: true,
        }
    }

    fn task_in(state: TaskState) -> PlatformTask {
        let mut task = PlatformTask::new(Uuid::new_v4(), Platform::Twitter, ContentType::Post);
        match state {
            TaskState::Pending => {}
            TaskState::Processing => task.mark_processing(),
            TaskState::Completed => task.mark_completed(serde_json::json!({})),
            TaskState::Failed => task.mark_failed(&CrosspostError::timeout("t", 1)),
            TaskState::Cancelled => task.mark_cancelled(),
        }
        task
    }

    #[test]
    fn test_any_non_terminal_means_processing() {
        let tasks = vec![
            task_in(TaskState::Completed),
            task_in(TaskState::Failed),
            task_in(TaskState::Processing),
        ];
        assert_eq!(Workflow::aggregate(&tasks), WorkflowState::Processing);
    }

    #[test]
    fn test_all_completed_means_completed() {
        let tasks = vec![task_in(TaskState::Completed), task_in(TaskState::Completed)];
        assert_eq!(Workflow::aggregate(&tasks), WorkflowState::Completed);
    }

    #[test]
    fn test_mixed_terminal_means_partial_failure() {
        let tasks = vec![task_in(TaskState::Completed), task_in(TaskState::Failed)];
        assert_eq!(Workflow::aggregate(&tasks), WorkflowState::PartialFailure);
    }

    #[test]
    fn test_all_failed_means_failed() {
        let tasks = vec![task_in(TaskState::Failed), task_in(TaskState::Failed)];
        assert_eq!(Workflow::aggregate(&tasks), WorkflowState::Failed);
    }

    #[test]
    fn test_cancelled_child_blocks_completed() {
        let tasks = vec![task_in(TaskState::Completed), task_in(TaskState::Cancelled)];
        assert_eq!(Workflow::aggregate(&tasks), WorkflowState::PartialFailure);
    }

    #[test]
    fn test_cancellation_overrides_aggregation() {
        let mut workflow = Workflow::new(Uuid::new_v4(), test_request());
        workflow
            .platform_tasks
            .push(task_in(TaskState::Completed));
        workflow.mark_cancelled();
        assert_eq!(workflow.aggregate_status(), WorkflowState::Cancelled);
        assert!(workflow.cancelled_at.is_some());
    }

    #[test]
    fn test_refresh_stamps_completed_at_once() {
        let mut workflow = Workflow::new(Uuid::new_v4(), test_request());
        workflow
            .platform_tasks
            .push(task_in(TaskState::Processing));
        workflow.refresh_status();
        assert!(workflow.completed_at.is_none());

        workflow.platform_tasks[0].mark_completed(serde_json::json!({}));
        workflow.refresh_status();
        let first = workflow.completed_at.unwrap();

        workflow.refresh_status();
        assert_eq!(workflow.completed_at.unwrap(), first);
    }

    proptest! {
        /// Completed iff every child completed; never terminal while any
        /// child is non-terminal.
        #[test]
        fn prop_aggregation_ordering(states in proptest::collection::vec(0u8..5, 1..12)) {
            let tasks: Vec<PlatformTask> = states
                .iter()
                .map(|s| {
                    task_in(match s {
                        0 => TaskState::Pending,
                        1 => TaskState::Processing,
                        2 => TaskState::Completed,
                        3 => TaskState::Failed,
                        _ => TaskState::Cancelled,
                    })
                })
                .collect();

            let status = Workflow::aggregate(&tasks);
            let any_non_terminal = tasks.iter().any(|t| !t.status.is_terminal());
            let all_completed = tasks.iter().all(|t| t.status == TaskState::Completed);

            prop_assert_eq!(status == WorkflowState::Processing, any_non_terminal);
            prop_assert_eq!(status == WorkflowState::Completed, all_completed);
        }
    }
}
