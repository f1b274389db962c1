//! # Stage Handlers
//!
//! Queue-worker side of the pipeline. [`PublicationTaskHandler`] executes
//! the generation, formatting, and publishing stages of workflow tasks;
//! [`CropTaskHandler`] serves the image adaptation queue for both pipeline
//! tasks and standalone crop submissions. Both share a [`StageContext`]
//! bundling the stores, adapters, and retry policy.
//!
//! Failure handling lives in `on_failure`: retryable errors with budget
//! left go back on their queue after a backoff delay, everything else
//! drives the task (and possibly the workflow) to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::formatting::{clamp_to_limit, format_with_capabilities};
use crate::adapters::{FormatRequest, FormattedContent, PublishContent};
use crate::capabilities::{CapabilityTable, ContentType, Platform};
use crate::config::TaskSettings;
use crate::credentials::CredentialStore;
use crate::cropping::{CropEngine, CropJob};
use crate::drafts::{DraftStore, NewDraft};
use crate::error::{CrosspostError, Result};
use crate::events::{EventPublisher, PublicationEvent};
use crate::messaging::{
    ExecutionStatusStore, QueueClient, TaskCategory, TaskHandler, TaskMessage,
};
use crate::models::{Draft, DraftContent, PlatformConfig, PlatformTask, Workflow};
use crate::orchestration::backoff::BackoffCalculator;
use crate::orchestration::store::WorkflowStore;
use crate::orchestration::types::{stage_message, TaskPayload};
use crate::registry::AdapterRegistry;
use crate::state_machine::{DraftState, TaskState, WorkflowState};

/// Shared components every stage handler works against.
pub struct StageContext {
    pub store: Arc<WorkflowStore>,
    pub drafts: Arc<DraftStore>,
    pub credentials: Arc<CredentialStore>,
    pub registry: Arc<AdapterRegistry>,
    pub queue: Arc<QueueClient>,
    pub statuses: Arc<ExecutionStatusStore>,
    pub engine: Arc<CropEngine>,
    pub events: EventPublisher,
    pub backoff: BackoffCalculator,
    pub settings: TaskSettings,
}

impl StageContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<WorkflowStore>,
        drafts: Arc<DraftStore>,
        credentials: Arc<CredentialStore>,
        registry: Arc<AdapterRegistry>,
        queue: Arc<QueueClient>,
        statuses: Arc<ExecutionStatusStore>,
        engine: Arc<CropEngine>,
        events: EventPublisher,
        backoff: BackoffCalculator,
        settings: TaskSettings,
    ) -> Self {
        Self {
            store,
            drafts,
            credentials,
            registry,
            queue,
            statuses,
            engine,
            events,
            backoff,
            settings,
        }
    }

    fn workflow(&self, workflow_id: Uuid) -> Result<Workflow> {
        self.store
            .get(workflow_id)
            .ok_or_else(|| CrosspostError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })
    }

    /// Move a task into `processing`, announcing the first start of an
    /// attempt (fresh tasks and retry re-entries arrive here as pending).
    fn begin_stage(&self, task_id: Uuid, was_pending: bool) -> Result<()> {
        let workflow = self.store.update_task(task_id, |task| task.mark_processing())?;
        if was_pending {
            if let Some(task) = workflow.task(task_id) {
                self.events.publish(PublicationEvent::TaskStarted {
                    task_id,
                    workflow_id: workflow.id,
                    platform: task.platform,
                });
            }
        }
        Ok(())
    }

    /// Cancel one task that reached a stage after its workflow was
    /// cancelled.
    fn cancel_task(&self, task_id: Uuid) -> Result<()> {
        self.store.update_task(task_id, |task| {
            if !task.is_terminal() {
                task.mark_cancelled();
            }
        })?;
        debug!(task_id = %task_id, "Task cancelled before stage work");
        Ok(())
    }

    /// Cancel every remaining task of a cancelled workflow at once; used
    /// by the generation stage, which runs before the fan-out.
    fn cancel_remaining_tasks(&self, workflow_id: Uuid) -> Result<()> {
        self.store.with_workflow_mut(workflow_id, |workflow| {
            for task in &mut workflow.platform_tasks {
                if !task.is_terminal() {
                    task.mark_cancelled();
                }
            }
            workflow.refresh_status();
        })?;
        debug!(workflow_id = %workflow_id, "Remaining tasks cancelled");
        Ok(())
    }

    fn complete_task(&self, task_id: Uuid, result: serde_json::Value) -> Result<()> {
        let workflow = self
            .store
            .update_task(task_id, |task| task.mark_completed(result))?;
        if let Some(task) = workflow.task(task_id) {
            self.events.publish(PublicationEvent::TaskCompleted {
                task_id,
                workflow_id: workflow.id,
                platform: task.platform,
            });
        }
        self.announce_if_finished(&workflow);
        Ok(())
    }

    /// Emit the workflow-finished event on the transition into a settled
    /// aggregate. Cancellation is announced by the cancel operation, not
    /// here.
    fn announce_if_finished(&self, workflow: &Workflow) {
        let status = workflow.aggregate_status();
        if matches!(
            status,
            WorkflowState::Completed | WorkflowState::PartialFailure | WorkflowState::Failed
        ) {
            self.events.publish(PublicationEvent::WorkflowCompleted {
                workflow_id: workflow.id,
                status: status.to_string(),
            });
            info!(workflow_id = %workflow.id, status = %status, "✅ Workflow finished");
        }
    }

    /// Standard failure path for a workflow task: schedule a retry when
    /// the error and the message budget allow it, otherwise fail the task.
    async fn fail_or_retry_task(&self, message: TaskMessage, error: CrosspostError) {
        let task_id = message.task_id;

        // A cancelled workflow absorbs late failures as cancellations.
        if self
            .store
            .get(message.workflow_id)
            .map(|workflow| workflow.cancelled)
            .unwrap_or(false)
        {
            if let Err(store_err) = self.cancel_task(task_id) {
                warn!(task_id = %task_id, error = %store_err, "Cancel bookkeeping failed");
            }
            return;
        }

        if error.is_retryable() && !message.is_max_retries_exceeded() {
            let mut retry = message;
            retry.increment_retry();
            let retry_count = retry.metadata.retry_count;
            let delay = self.backoff.delay_for(retry_count, &error);

            match self
                .store
                .update_task(task_id, |task| task.mark_retry_pending(&error))
            {
                Ok(workflow) => {
                    self.events.publish(PublicationEvent::TaskRetryScheduled {
                        task_id,
                        workflow_id: workflow.id,
                        retry_count,
                        delay_seconds: delay.delay_seconds.into(),
                    });
                    info!(
                        task_id = %task_id,
                        retry_count,
                        delay_seconds = delay.delay_seconds,
                        backoff = ?delay.backoff_type,
                        "⏰ Task retry scheduled"
                    );
                    self.schedule_resend(retry, delay.delay_seconds);
                }
                Err(store_err) => {
                    warn!(task_id = %task_id, error = %store_err, "Retry bookkeeping failed")
                }
            }
        } else {
            match self
                .store
                .update_task(task_id, |task| task.mark_failed(&error))
            {
                Ok(workflow) => {
                    if let Some(task) = workflow.task(task_id) {
                        self.events.publish(PublicationEvent::TaskFailed {
                            task_id,
                            workflow_id: workflow.id,
                            platform: task.platform,
                            error: error.to_string(),
                            final_state: task.status,
                        });
                    }
                    warn!(task_id = %task_id, error = %error, "Task failed terminally");
                    self.announce_if_finished(&workflow);
                }
                Err(store_err) => {
                    warn!(task_id = %task_id, error = %store_err, "Failure bookkeeping failed")
                }
            }
        }
    }

    /// Generation has no task of its own; an exhausted failure takes the
    /// whole workflow down.
    async fn fail_or_retry_generation(&self, message: TaskMessage, error: CrosspostError) {
        let workflow_id = message.workflow_id;

        if error.is_retryable() && !message.is_max_retries_exceeded() {
            let mut retry = message;
            retry.increment_retry();
            let retry_count = retry.metadata.retry_count;
            let delay = self.backoff.delay_for(retry_count, &error);

            self.events.publish(PublicationEvent::TaskRetryScheduled {
                task_id: workflow_id,
                workflow_id,
                retry_count,
                delay_seconds: delay.delay_seconds.into(),
            });
            info!(
                workflow_id = %workflow_id,
                retry_count,
                delay_seconds = delay.delay_seconds,
                "⏰ Generation retry scheduled"
            );
            self.schedule_resend(retry, delay.delay_seconds);
            return;
        }

        warn!(
            workflow_id = %workflow_id,
            error = %error,
            "Generation failed terminally, failing remaining tasks"
        );
        let failed = self.store.with_workflow_mut(workflow_id, |workflow| {
            let mut failed_tasks = Vec::new();
            for task in &mut workflow.platform_tasks {
                if !task.is_terminal() {
                    task.mark_failed(&error);
                    failed_tasks.push((task.id, task.platform, task.status));
                }
            }
            workflow.refresh_status();
            (workflow.clone(), failed_tasks)
        });

        match failed {
            Ok((workflow, failed_tasks)) => {
                for (task_id, platform, final_state) in failed_tasks {
                    self.events.publish(PublicationEvent::TaskFailed {
                        task_id,
                        workflow_id,
                        platform,
                        error: error.to_string(),
                        final_state,
                    });
                }
                self.announce_if_finished(&workflow);
            }
            Err(store_err) => {
                warn!(workflow_id = %workflow_id, error = %store_err, "Failure bookkeeping failed")
            }
        }
    }

    /// Re-enqueue a retry after its backoff delay without blocking the
    /// worker that reported the failure.
    fn schedule_resend(&self, message: TaskMessage, delay_seconds: u32) {
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(delay_seconds))).await;
            let task_id = message.task_id;
            if let Err(error) = queue.send(message).await {
                warn!(task_id = %task_id, error = %error, "Retry re-enqueue failed");
            }
        });
    }

    /// Stage the task's formatted content as a draft, reusing the draft a
    /// previous attempt of this task already created.
    async fn stage_draft(
        &self,
        workflow: &Workflow,
        task: &PlatformTask,
        content: &PublishContent,
        formatted: &FormattedContent,
        native: bool,
    ) -> Result<Draft> {
        if let Some(existing) = task.staged_draft_id.and_then(|id| self.drafts.get(id)) {
            return Ok(existing);
        }

        let draft_content = DraftContent {
            text: formatted.text.clone(),
            content_type: task.content_type,
            hashtags: formatted.hashtags.clone(),
            mentions: formatted.mentions.clone(),
            lien_source: formatted.lien_source.clone(),
            images: content.images.clone(),
        };
        let site = workflow.request.site_web;
        let mut new_draft = NewDraft::new(site, task.platform, draft_content);

        if native {
            let credentials = self.credentials.get(site, task.platform).ok_or_else(|| {
                CrosspostError::credentials(site.as_str(), task.platform.as_str())
            })?;
            let publisher = self.registry.publisher(task.platform)?;
            let reference = publisher.stage_draft(content, &credentials).await?;
            new_draft = new_draft.with_native_reference(reference);
        }

        let draft = self.drafts.create(new_draft);
        self.store.update_task(task.id, |task| {
            task.staged_draft_id = Some(draft.draft_id);
        })?;
        Ok(draft)
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("workflows", &self.store.len())
            .field("drafts", &self.drafts.len())
            .finish()
    }
}

fn config_for(workflow: &Workflow, platform: Platform) -> Result<&PlatformConfig> {
    workflow
        .request
        .platforms_config
        .iter()
        .find(|config| config.platform == platform)
        .ok_or_else(|| {
            CrosspostError::internal(format!(
                "no platform config for {platform} in workflow {}",
                workflow.id
            ))
        })
}

fn task_in_workflow(workflow: &Workflow, task_id: Uuid) -> Result<PlatformTask> {
    workflow.task(task_id).cloned().ok_or_else(|| {
        CrosspostError::internal(format!(
            "task {task_id} missing from workflow {}",
            workflow.id
        ))
    })
}

/// Handler for the generation, formatting, and publishing queues.
#[derive(Debug)]
pub struct PublicationTaskHandler {
    context: Arc<StageContext>,
}

impl PublicationTaskHandler {
    pub fn new(context: Arc<StageContext>) -> Self {
        Self { context }
    }

    /// Generation runs once per workflow: produce the base content every
    /// platform task formats from, then fan formatting out.
    async fn handle_generation(&self, message: TaskMessage) -> Result<()> {
        let context = &self.context;
        let workflow_id = message.workflow_id;
        let workflow = context.workflow(workflow_id)?;
        if workflow.cancelled {
            return context.cancel_remaining_tasks(workflow_id);
        }

        let site = workflow.request.site_web;
        let source = workflow.request.texte_source.clone();
        let base = match context.registry.generator() {
            Some(generator) => {
                let generated = generator.generate(site, &source).await?;
                if generated.trim().is_empty() {
                    warn!(
                        workflow_id = %workflow_id,
                        "Generator returned empty content, using the source text"
                    );
                    source
                } else {
                    generated
                }
            }
            None => source,
        };

        context.store.with_workflow_mut(workflow_id, |workflow| {
            workflow.base_content = Some(base);
        })?;
        info!(workflow_id = %workflow_id, "✅ Base content ready");

        for task in workflow.platform_tasks.iter().filter(|t| !t.is_terminal()) {
            let next = stage_message(
                task.id,
                workflow_id,
                TaskCategory::ContentFormatting,
                &TaskPayload::Pipeline,
                &context.settings,
            )?;
            context.queue.send(next).await?;
        }
        Ok(())
    }

    async fn handle_formatting(&self, message: TaskMessage) -> Result<()> {
        let context = &self.context;
        let workflow = context.workflow(message.workflow_id)?;
        if workflow.cancelled {
            return context.cancel_task(message.task_id);
        }
        let task = task_in_workflow(&workflow, message.task_id)?;
        let config = config_for(&workflow, task.platform)?.clone();
        context.begin_stage(task.id, task.status == TaskState::Pending)?;

        let request = FormatRequest {
            site: workflow.request.site_web,
            platform: task.platform,
            content_type: task.content_type,
            base_content: workflow
                .base_content
                .clone()
                .unwrap_or_else(|| workflow.request.texte_source.clone()),
            hashtags: config.hashtags.clone().unwrap_or_default(),
            mentions: config.mentions.clone().unwrap_or_default(),
            lien_source: config.lien_source.clone(),
        };

        let formatted = match context.registry.formatter(task.platform) {
            Some(formatter) => {
                let mut out = formatter.format(&request).await?;
                // Adapter output is clamped to the platform limit too.
                out.text = clamp_to_limit(task.platform, &out.text);
                out.character_count = out.text.chars().count();
                out
            }
            None => format_with_capabilities(&request),
        };
        debug!(
            task_id = %task.id,
            platform = %task.platform,
            characters = formatted.character_count,
            "📝 Content formatted"
        );

        let value = serde_json::to_value(&formatted)?;
        context.store.update_task(task.id, |task| {
            task.formatted_content = Some(value);
        })?;

        let next_category = if config.has_images() {
            TaskCategory::ImageAdaptation
        } else {
            TaskCategory::ContentPublishing
        };
        let next = stage_message(
            task.id,
            workflow.id,
            next_category,
            &TaskPayload::Pipeline,
            &context.settings,
        )?;
        context.queue.send(next).await?;
        Ok(())
    }

    /// Terminal stage: stage a draft, publish, or both, per the task's
    /// staging decision and the platform's native draft support.
    async fn handle_publishing(&self, message: TaskMessage) -> Result<()> {
        let context = &self.context;
        let workflow = context.workflow(message.workflow_id)?;
        if workflow.cancelled {
            return context.cancel_task(message.task_id);
        }
        let task = task_in_workflow(&workflow, message.task_id)?;
        let config = config_for(&workflow, task.platform)?.clone();
        context.begin_stage(task.id, task.status == TaskState::Pending)?;

        let formatted: FormattedContent = match &task.formatted_content {
            Some(value) => serde_json::from_value(value.clone())?,
            None => {
                return Err(CrosspostError::internal(format!(
                    "publish stage reached without formatted content for task {}",
                    task.id
                )))
            }
        };

        let site = workflow.request.site_web;
        let content = PublishContent {
            site,
            platform: task.platform,
            content_type: task.content_type,
            text: formatted.text.clone(),
            images: task.adapted_images.clone().unwrap_or_default(),
            lien_sticker: config.lien_sticker.clone(),
            titre_carousel: config.titre_carousel.clone(),
        };

        let native = CapabilityTable::native_draft_support(task.platform);

        if !config.effective_published(workflow.request.published) {
            let draft = context
                .stage_draft(&workflow, &task, &content, &formatted, native)
                .await?;
            info!(
                task_id = %task.id,
                draft_id = %draft.draft_id,
                simulated = draft.simulated,
                "📝 Draft staged instead of publishing"
            );
            return context.complete_task(
                task.id,
                serde_json::json!({
                    "draft_id": draft.draft_id,
                    "simulated": draft.simulated,
                }),
            );
        }

        // Immediate publication. Platforms without native staging get the
        // formatted content staged as a simulated draft first; the draft
        // is promoted in place once the publish call succeeds.
        let staged = if native {
            None
        } else {
            Some(
                context
                    .stage_draft(&workflow, &task, &content, &formatted, false)
                    .await?,
            )
        };

        let credentials = context.credentials.get(site, task.platform).ok_or_else(|| {
            CrosspostError::credentials(site.as_str(), task.platform.as_str())
        })?;
        let publisher = context.registry.publisher(task.platform)?;

        let idempotency_token = (message.metadata.retry_count > 0)
            .then(|| Uuid::new_v5(&task.id, b"publish-idempotency").to_string());

        let outcome = publisher
            .publish(&content, &credentials, idempotency_token.as_deref())
            .await?;
        info!(
            task_id = %task.id,
            platform = %task.platform,
            post_id = %outcome.post_id,
            "📤 Published"
        );

        if let Some(draft) = staged {
            if draft.status == DraftState::Draft {
                if let Err(error) = context.drafts.mark_published(draft.draft_id, Some(workflow.id))
                {
                    warn!(
                        draft_id = %draft.draft_id,
                        error = %error,
                        "Staged draft could not be marked published"
                    );
                }
            }
        }

        context.complete_task(task.id, serde_json::to_value(&outcome)?)
    }
}

#[async_trait]
impl TaskHandler for PublicationTaskHandler {
    async fn handle(&self, message: TaskMessage) -> Result<()> {
        match message.category {
            TaskCategory::ContentGeneration => self.handle_generation(message).await,
            TaskCategory::ContentFormatting => self.handle_formatting(message).await,
            TaskCategory::ContentPublishing => self.handle_publishing(message).await,
            TaskCategory::ImageAdaptation => Err(CrosspostError::internal(
                "image adaptation messages belong to the crop handler",
            )),
        }
    }

    async fn on_failure(&self, message: TaskMessage, error: CrosspostError) {
        if message.category == TaskCategory::ContentGeneration {
            self.context.fail_or_retry_generation(message, error).await;
        } else {
            self.context.fail_or_retry_task(message, error).await;
        }
    }
}

/// Handler for the image adaptation queue.
#[derive(Debug)]
pub struct CropTaskHandler {
    context: Arc<StageContext>,
}

impl CropTaskHandler {
    pub fn new(context: Arc<StageContext>) -> Self {
        Self { context }
    }

    /// Adaptation stage of a workflow task: one crop job per source image,
    /// per slide for carousels.
    async fn handle_pipeline(&self, message: TaskMessage) -> Result<()> {
        let context = &self.context;
        let workflow = context.workflow(message.workflow_id)?;
        if workflow.cancelled {
            return context.cancel_task(message.task_id);
        }
        let task = task_in_workflow(&workflow, message.task_id)?;
        let config = config_for(&workflow, task.platform)?.clone();
        context.begin_stage(task.id, task.status == TaskState::Pending)?;

        let sources = config.image_sources();
        let jobs: Vec<CropJob> = match task.content_type {
            ContentType::Carousel => sources
                .iter()
                .enumerate()
                .map(|(index, source)| {
                    CropJob::for_slide(source, task.platform, task.content_type, index as u32)
                })
                .collect::<Result<_>>()?,
            _ => sources
                .iter()
                .map(|source| CropJob::new(source, task.platform, task.content_type))
                .collect::<Result<_>>()?,
        };

        let results = context.engine.adapt_all(&jobs).await?;
        let references: Vec<String> = results
            .iter()
            .map(|result| result.result_reference.clone())
            .collect();
        debug!(task_id = %task.id, images = references.len(), "Images adapted");

        context.store.update_task(task.id, |task| {
            task.adapted_images = Some(references);
        })?;

        let next = stage_message(
            task.id,
            workflow.id,
            TaskCategory::ContentPublishing,
            &TaskPayload::Pipeline,
            &context.settings,
        )?;
        context.queue.send(next).await?;
        Ok(())
    }

    async fn handle_standalone(
        &self,
        task_id: Uuid,
        source: String,
        platform: Platform,
        content_type: ContentType,
        force_refresh: bool,
    ) -> Result<()> {
        let context = &self.context;
        context.statuses.mark_processing(task_id);

        let job = CropJob::new(source, platform, content_type)?;
        let result = if force_refresh {
            context.engine.refresh(&job).await?
        } else {
            context.engine.adapt(&job).await?
        };

        context
            .statuses
            .mark_completed(task_id, serde_json::to_value(&result)?);
        Ok(())
    }

    async fn standalone_failure(&self, message: TaskMessage, error: CrosspostError) {
        let context = &self.context;
        let task_id = message.task_id;

        if error.is_retryable() && !message.is_max_retries_exceeded() {
            let mut retry = message;
            retry.increment_retry();
            let retry_count = retry.metadata.retry_count;
            let delay = context.backoff.delay_for(retry_count, &error);

            context.statuses.mark_retrying(task_id, retry_count);
            info!(
                task_id = %task_id,
                retry_count,
                delay_seconds = delay.delay_seconds,
                "⏰ Crop retry scheduled"
            );
            context.schedule_resend(retry, delay.delay_seconds);
        } else {
            context.statuses.mark_failed(task_id, error.to_string());
            warn!(task_id = %task_id, error = %error, "Crop task failed terminally");
        }
    }
}

#[async_trait]
impl TaskHandler for CropTaskHandler {
    async fn handle(&self, message: TaskMessage) -> Result<()> {
        let payload: TaskPayload = serde_json::from_value(message.payload.clone())?;
        match payload {
            TaskPayload::Pipeline => self.handle_pipeline(message).await,
            TaskPayload::StandaloneCrop {
                source,
                platform,
                content_type,
                force_refresh,
            } => {
                self.handle_standalone(
                    message.task_id,
                    source,
                    platform,
                    content_type,
                    force_refresh,
                )
                .await
            }
        }
    }

    async fn on_failure(&self, message: TaskMessage, error: CrosspostError) {
        match serde_json::from_value::<TaskPayload>(message.payload.clone()) {
            Ok(TaskPayload::StandaloneCrop { .. }) => {
                self.standalone_failure(message, error).await
            }
            _ => self.context.fail_or_retry_task(message, error).await,
        }
    }
}
