//! # Workflow Orchestrator
//!
//! Entry point for all publication work. Validates requests, fans one
//! workflow out into per-platform tasks, runs the credential pre-check,
//! enqueues the first pipeline stage, and serves status reads, cancel,
//! retry, draft publication, and standalone crop submissions.
//!
//! The orchestrator only ever touches queues and stores; the stages
//! themselves run in queue workers (see [`crate::orchestration::handlers`]).

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::FormattedContent;
use crate::capabilities::{CapabilityTable, ContentType, Platform};
use crate::config::TaskSettings;
use crate::credentials::CredentialStore;
use crate::cropping::CropJob;
use crate::drafts::DraftStore;
use crate::error::{CrosspostError, Result};
use crate::events::{EventPublisher, PublicationEvent};
use crate::messaging::{ExecutionStatus, ExecutionStatusStore, QueueClient, TaskCategory};
use crate::models::{Draft, EnhancedPublishRequest, PlatformConfig, PlatformTask, Workflow};
use crate::orchestration::store::WorkflowStore;
use crate::orchestration::types::{
    stage_message, TaskPayload, WorkflowMetrics, WorkflowSnapshot,
};
use crate::registry::AdapterRegistry;
use crate::state_machine::WorkflowState;

/// Coordinates workflow creation and the operations on existing workflows.
pub struct WorkflowOrchestrator {
    store: Arc<WorkflowStore>,
    drafts: Arc<DraftStore>,
    credentials: Arc<CredentialStore>,
    registry: Arc<AdapterRegistry>,
    queue: Arc<QueueClient>,
    statuses: Arc<ExecutionStatusStore>,
    events: EventPublisher,
    settings: TaskSettings,
}

impl WorkflowOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<WorkflowStore>,
        drafts: Arc<DraftStore>,
        credentials: Arc<CredentialStore>,
        registry: Arc<AdapterRegistry>,
        queue: Arc<QueueClient>,
        statuses: Arc<ExecutionStatusStore>,
        events: EventPublisher,
        settings: TaskSettings,
    ) -> Self {
        Self {
            store,
            drafts,
            credentials,
            registry,
            queue,
            statuses,
            events,
            settings,
        }
    }

    /// Create a workflow under a fresh id and enqueue its first stage.
    pub async fn create_workflow(
        &self,
        request: EnhancedPublishRequest,
    ) -> Result<WorkflowSnapshot> {
        self.create_workflow_with_id(Uuid::new_v4(), request).await
    }

    /// Create a workflow under a caller-chosen id. Rejects id reuse, so
    /// resubmitting the same id cannot double-publish.
    #[instrument(skip(self, request), fields(site = %request.site_web))]
    pub async fn create_workflow_with_id(
        &self,
        workflow_id: Uuid,
        request: EnhancedPublishRequest,
    ) -> Result<WorkflowSnapshot> {
        request.validate()?;

        let mut workflow = Workflow::new(workflow_id, request.clone());
        let site = request.site_web;

        for config in &request.platforms_config {
            let task = if Self::requires_credentials(config, request.published)
                && !self.credentials.has_credentials(site, config.platform)
            {
                let error =
                    CrosspostError::credentials(site.as_str(), config.platform.as_str());
                warn!(
                    workflow_id = %workflow_id,
                    platform = %config.platform,
                    "Platform task failed before enqueue: credentials not configured"
                );
                PlatformTask::failed_immediately(
                    workflow_id,
                    config.platform,
                    config.content_type,
                    &error,
                )
            } else {
                PlatformTask::new(workflow_id, config.platform, config.content_type)
            };
            workflow.platform_tasks.push(task);
        }

        let generate = self.registry.generator().is_some();
        if !generate {
            workflow.base_content = Some(request.texte_source.clone());
        }
        workflow.refresh_status();
        self.store.insert(workflow.clone())?;

        self.events.publish(PublicationEvent::WorkflowCreated {
            workflow_id,
            platform_count: request.platforms_config.len(),
        });
        info!(
            workflow_id = %workflow_id,
            site = %site,
            platforms = request.platforms_config.len(),
            "🚀 Workflow created"
        );

        let ready: Vec<Uuid> = workflow
            .platform_tasks
            .iter()
            .filter(|task| !task.is_terminal())
            .map(|task| task.id)
            .collect();

        if !ready.is_empty() {
            if generate {
                // Generation runs once per workflow; the message rides on
                // the workflow id rather than any single task.
                let message = stage_message(
                    workflow_id,
                    workflow_id,
                    TaskCategory::ContentGeneration,
                    &TaskPayload::Pipeline,
                    &self.settings,
                )?;
                self.queue.send(message).await?;
            } else {
                for task_id in ready {
                    let message = stage_message(
                        task_id,
                        workflow_id,
                        TaskCategory::ContentFormatting,
                        &TaskPayload::Pipeline,
                        &self.settings,
                    )?;
                    self.queue.send(message).await?;
                }
            }
        } else {
            // Every task failed the pre-enqueue checks; nothing will run,
            // so the workflow is already settled.
            let status = workflow.aggregate_status();
            self.events.publish(PublicationEvent::WorkflowCompleted {
                workflow_id,
                status: status.to_string(),
            });
            warn!(
                workflow_id = %workflow_id,
                status = %status,
                "Workflow terminal at creation: no task could be enqueued"
            );
        }

        Ok(WorkflowSnapshot::from_workflow(&workflow))
    }

    /// Current snapshot of one workflow.
    pub fn status(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        self.store
            .get(workflow_id)
            .map(|workflow| WorkflowSnapshot::from_workflow(&workflow))
            .ok_or_else(|| CrosspostError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })
    }

    /// Request cooperative cancellation. Stages check the flag before they
    /// run; work already inside a platform call finishes and is recorded,
    /// but the aggregate stays `cancelled`. Cancelling a workflow that is
    /// already terminal reports its state unchanged.
    pub fn cancel_workflow(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        let (snapshot, newly_cancelled) =
            self.store.with_workflow_mut(workflow_id, |workflow| {
                if workflow.aggregate_status().is_terminal() {
                    (WorkflowSnapshot::from_workflow(workflow), false)
                } else {
                    workflow.mark_cancelled();
                    (WorkflowSnapshot::from_workflow(workflow), true)
                }
            })?;

        if newly_cancelled {
            self.events
                .publish(PublicationEvent::WorkflowCancelled { workflow_id });
            info!(workflow_id = %workflow_id, "🛑 Workflow cancelled");
        }
        Ok(snapshot)
    }

    /// Re-run a failed or cancelled workflow as a brand-new submission of
    /// the original request. Partial failures are excluded: re-running the
    /// full request would double-publish the platforms that succeeded.
    pub async fn retry_workflow(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        let workflow =
            self.store
                .get(workflow_id)
                .ok_or_else(|| CrosspostError::WorkflowNotFound {
                    workflow_id: workflow_id.to_string(),
                })?;

        let status = workflow.aggregate_status();
        if !matches!(status, WorkflowState::Failed | WorkflowState::Cancelled) {
            return Err(CrosspostError::validation(format!(
                "workflow {workflow_id} is {status}; only failed or cancelled workflows can be retried"
            )));
        }

        info!(original_workflow_id = %workflow_id, "Retrying workflow as a new submission");
        self.create_workflow(workflow.request.clone()).await
    }

    pub fn list_workflows(&self) -> Vec<WorkflowSnapshot> {
        self.store
            .list()
            .iter()
            .map(WorkflowSnapshot::from_workflow)
            .collect()
    }

    pub fn metrics(&self) -> WorkflowMetrics {
        WorkflowMetrics::from_workflows(&self.store.list())
    }

    /// Publish a staged draft through a single-platform workflow that
    /// skips generation, formatting, and adaptation: the staged content
    /// publishes exactly as reviewed.
    #[instrument(skip(self))]
    pub async fn publish_draft(&self, draft_id: Uuid) -> Result<WorkflowSnapshot> {
        let draft =
            self.drafts
                .get(draft_id)
                .ok_or_else(|| CrosspostError::DraftNotFound {
                    draft_id: draft_id.to_string(),
                })?;
        let platform = draft.platform;
        let site = draft.site;

        if !self.credentials.has_credentials(site, platform) {
            return Err(CrosspostError::credentials(site.as_str(), platform.as_str()));
        }

        let request = draft_publication_request(&draft);
        request.validate()?;

        let workflow_id = Uuid::new_v4();
        // The once-only transition. Concurrent publishes of the same draft
        // lose here with DraftAlreadyPublished and create no workflow.
        self.drafts.mark_published(draft_id, Some(workflow_id))?;

        let mut workflow = Workflow::new(workflow_id, request);
        workflow.base_content = Some(draft.content.text.clone());

        let mut task = PlatformTask::new(workflow_id, platform, draft.content.content_type);
        task.formatted_content = Some(serde_json::to_value(formatted_from_draft(&draft))?);
        // Pointing the task at the source draft keeps the publish stage
        // from staging a second copy on non-native platforms.
        task.staged_draft_id = Some(draft_id);
        if !draft.content.images.is_empty() {
            task.adapted_images = Some(draft.content.images.clone());
        }
        let task_id = task.id;
        workflow.platform_tasks.push(task);
        workflow.refresh_status();
        self.store.insert(workflow.clone())?;

        self.events.publish(PublicationEvent::WorkflowCreated {
            workflow_id,
            platform_count: 1,
        });
        info!(
            draft_id = %draft_id,
            workflow_id = %workflow_id,
            platform = %platform,
            "🚀 Draft publication workflow created"
        );

        let message = stage_message(
            task_id,
            workflow_id,
            TaskCategory::ContentPublishing,
            &TaskPayload::Pipeline,
            &self.settings,
        )?;
        self.queue.send(message).await?;

        Ok(WorkflowSnapshot::from_workflow(&workflow))
    }

    /// Submit a standalone image adaptation. Returns the handle used to
    /// poll its execution status.
    pub async fn submit_crop(
        &self,
        source: impl Into<String>,
        platform: Platform,
        content_type: ContentType,
        force_refresh: bool,
    ) -> Result<Uuid> {
        let source = source.into();
        // Rejects (platform, content type) pairs with no dimension entry
        // before anything is enqueued.
        CropJob::new(source.clone(), platform, content_type)?;

        let task_id = Uuid::new_v4();
        self.statuses
            .mark_pending(task_id, TaskCategory::ImageAdaptation);

        let payload = TaskPayload::StandaloneCrop {
            source,
            platform,
            content_type,
            force_refresh,
        };
        let message = stage_message(
            task_id,
            task_id,
            TaskCategory::ImageAdaptation,
            &payload,
            &self.settings,
        )?;
        self.queue.send(message).await?;

        info!(task_id = %task_id, platform = %platform, "📥 Crop task submitted");
        Ok(task_id)
    }

    /// Execution status of a standalone crop submission.
    pub fn crop_status(&self, task_id: Uuid) -> Option<ExecutionStatus> {
        self.statuses.get(task_id)
    }

    /// Whether a platform task will touch the platform API at all. Tasks
    /// heading for a simulated draft never need credentials.
    fn requires_credentials(config: &PlatformConfig, request_default: bool) -> bool {
        config.effective_published(request_default)
            || CapabilityTable::native_draft_support(config.platform)
    }
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("workflows", &self.store.len())
            .field("drafts", &self.drafts.len())
            .finish()
    }
}

/// Synthesize the advanced request a draft publication runs under.
fn draft_publication_request(draft: &Draft) -> EnhancedPublishRequest {
    let content = &draft.content;
    let mut config = PlatformConfig::new(draft.platform, content.content_type);
    config.hashtags = (!content.hashtags.is_empty()).then(|| content.hashtags.clone());
    config.mentions = (!content.mentions.is_empty()).then(|| content.mentions.clone());
    config.lien_source = content.lien_source.clone();
    config.published = Some(true);
    match content.content_type {
        ContentType::Carousel => {
            config.nb_slides = Some(content.images.len() as u32);
            config.images_urls = Some(content.images.clone());
        }
        _ => {
            config.image_s3_url = content.images.first().cloned();
        }
    }

    EnhancedPublishRequest {
        texte_source: content.text.clone(),
        site_web: draft.site,
        platforms_config: vec![config],
        published: true,
    }
}

/// Staged draft content already went through formatting; rebuild the
/// formatted record the publish stage expects.
fn formatted_from_draft(draft: &Draft) -> FormattedContent {
    let content = &draft.content;
    FormattedContent {
        platform: draft.platform,
        text: content.text.clone(),
        hashtags: content.hashtags.clone(),
        mentions: content.mentions.clone(),
        lien_source: content.lien_source.clone(),
        character_count: content.text.chars().count(),
    }
}
