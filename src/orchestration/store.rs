//! # Workflow Store
//!
//! In-memory registry of workflows plus a task-id index so queue workers
//! can reach their owning workflow without a scan. All mutation happens
//! under the per-entry lock of the owning workflow; callers pass closures
//! and never hold a map guard across an await.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{CrosspostError, Result};
use crate::models::{PlatformTask, Workflow};

/// Concurrent map of workflow id to workflow, indexed by task id.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    workflows: DashMap<Uuid, Workflow>,
    task_index: DashMap<Uuid, Uuid>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
            task_index: DashMap::new(),
        }
    }

    /// Insert a new workflow, rejecting id reuse.
    pub fn insert(&self, workflow: Workflow) -> Result<()> {
        let workflow_id = workflow.id;
        match self.workflows.entry(workflow_id) {
            Entry::Occupied(_) => {
                return Err(CrosspostError::DuplicateWorkflow { workflow_id });
            }
            Entry::Vacant(slot) => {
                for task in &workflow.platform_tasks {
                    self.task_index.insert(task.id, workflow_id);
                }
                slot.insert(workflow);
            }
        }
        Ok(())
    }

    pub fn contains(&self, workflow_id: Uuid) -> bool {
        self.workflows.contains_key(&workflow_id)
    }

    pub fn get(&self, workflow_id: Uuid) -> Option<Workflow> {
        self.workflows.get(&workflow_id).map(|entry| entry.clone())
    }

    /// Owning workflow id for a task, if the task is known.
    pub fn workflow_id_for_task(&self, task_id: Uuid) -> Option<Uuid> {
        self.task_index.get(&task_id).map(|entry| *entry)
    }

    /// All workflows, oldest first.
    pub fn list(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self
            .workflows
            .iter()
            .map(|entry| entry.clone())
            .collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        workflows
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Run a closure against a workflow under its entry lock and return
    /// the closure result.
    pub fn with_workflow_mut<R>(
        &self,
        workflow_id: Uuid,
        apply: impl FnOnce(&mut Workflow) -> R,
    ) -> Result<R> {
        let mut entry =
            self.workflows
                .get_mut(&workflow_id)
                .ok_or_else(|| CrosspostError::WorkflowNotFound {
                    workflow_id: workflow_id.to_string(),
                })?;
        Ok(apply(&mut entry))
    }

    /// Mutate one task through the task index, refresh the workflow's
    /// cached status, and return the updated workflow.
    pub fn update_task(
        &self,
        task_id: Uuid,
        apply: impl FnOnce(&mut PlatformTask),
    ) -> Result<Workflow> {
        let workflow_id =
            self.workflow_id_for_task(task_id)
                .ok_or_else(|| CrosspostError::WorkflowNotFound {
                    workflow_id: format!("task {task_id}"),
                })?;

        self.with_workflow_mut(workflow_id, |workflow| {
            match workflow.task_mut(task_id) {
                Some(task) => apply(task),
                None => {
                    return Err(CrosspostError::internal(format!(
                        "task {task_id} not present in workflow {workflow_id}"
                    )))
                }
            }
            workflow.refresh_status();
            Ok(workflow.clone())
        })?
    }
}
