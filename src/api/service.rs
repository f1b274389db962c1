//! # Crosspost Service
//!
//! Transport-agnostic facade over the whole system: one constructed
//! service owns the stores, the queue set, and the worker pools, and
//! exposes one method per public operation. An embedding HTTP layer (or a
//! test) calls these methods directly; every error carries the HTTP
//! status it maps to via [`CrosspostError::http_status`].
//!
//! Adapters and credentials are seams: callers register
//! publisher/formatter/generator implementations on [`registry`] and load
//! credentials into [`credentials`] before (or after) `start`.
//!
//! [`registry`]: CrosspostService::registry
//! [`credentials`]: CrosspostService::credentials

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::adapters::ImageRepository;
use crate::api::types::{
    AcceptedResponse, CropSubmission, HealthStatus, QueueStatus, QueueWorkerStatus,
    UnifiedCropRequest, WorkflowStatusView,
};
use crate::config::CrosspostConfig;
use crate::constants::queues;
use crate::credentials::{CredentialStore, CredentialsStatus};
use crate::cropping::{default_chain, CropEngine};
use crate::drafts::DraftStore;
use crate::error::{CrosspostError, Result};
use crate::events::EventPublisher;
use crate::messaging::{
    ExecutionStatusStore, QueueClient, TaskHandler, WorkerPool,
};
use crate::models::{Draft, EnhancedPublishRequest, PublishRequest};
use crate::orchestration::{
    BackoffCalculator, CropTaskHandler, PublicationTaskHandler, StageContext, WorkflowMetrics,
    WorkflowOrchestrator, WorkflowSnapshot, WorkflowStore,
};
use crate::registry::AdapterRegistry;
use crate::state_machine::DraftState;

/// Fully wired instance of the publication system.
pub struct CrosspostService {
    config: CrosspostConfig,
    queue: Arc<QueueClient>,
    credentials: Arc<CredentialStore>,
    registry: Arc<AdapterRegistry>,
    drafts: Arc<DraftStore>,
    statuses: Arc<ExecutionStatusStore>,
    events: EventPublisher,
    orchestrator: WorkflowOrchestrator,
    pools: Vec<WorkerPool>,
}

impl CrosspostService {
    /// Wire up every component from one configuration. Worker pools are
    /// created but not started; call [`start`](Self::start).
    pub fn new(config: CrosspostConfig, repository: Arc<dyn ImageRepository>) -> Self {
        Self::with_credentials(config, repository, CredentialStore::from_env())
    }

    /// Like [`new`](Self::new) with an explicitly loaded credential store.
    pub fn with_credentials(
        config: CrosspostConfig,
        repository: Arc<dyn ImageRepository>,
        credentials: CredentialStore,
    ) -> Self {
        let events = EventPublisher::default();
        let queue = Arc::new(QueueClient::new(config.queues.capacity));
        let credentials = Arc::new(credentials);
        let registry = Arc::new(AdapterRegistry::new());
        let store = Arc::new(WorkflowStore::new());
        let drafts = Arc::new(DraftStore::new(events.clone()));
        let statuses = Arc::new(ExecutionStatusStore::new());
        let engine = Arc::new(CropEngine::with_strategies(
            repository,
            events.clone(),
            default_chain(config.crop.saliency_confidence_threshold),
            config.crop.jpeg_quality,
        ));

        let orchestrator = WorkflowOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&drafts),
            Arc::clone(&credentials),
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&statuses),
            events.clone(),
            config.tasks.clone(),
        );

        let context = Arc::new(StageContext::new(
            store,
            Arc::clone(&drafts),
            Arc::clone(&credentials),
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&statuses),
            engine,
            events.clone(),
            BackoffCalculator::new(config.backoff.clone()),
            config.tasks.clone(),
        ));
        let publication: Arc<dyn TaskHandler> =
            Arc::new(PublicationTaskHandler::new(Arc::clone(&context)));
        let crop: Arc<dyn TaskHandler> = Arc::new(CropTaskHandler::new(context));

        let pools = vec![
            WorkerPool::new(
                queues::CONTENT_GENERATION,
                config.queues.generation_workers,
                Arc::clone(&publication),
            ),
            WorkerPool::new(
                queues::CONTENT_FORMATTING,
                config.queues.formatting_workers,
                Arc::clone(&publication),
            ),
            WorkerPool::new(
                queues::CONTENT_PUBLISHING,
                config.queues.publishing_workers,
                publication,
            ),
            WorkerPool::new(
                queues::IMAGE_ADAPTATION,
                config.queues.adaptation_workers,
                crop,
            ),
        ];

        Self {
            config,
            queue,
            credentials,
            registry,
            drafts,
            statuses,
            events,
            orchestrator,
            pools,
        }
    }

    /// Adapter registration point for embedders.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Event stream of the whole system; subscribe before the activity of
    /// interest starts.
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Start one worker pool per queue.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        for pool in &self.pools {
            let receiver = self.queue.take_receiver(pool.queue_name())?;
            pool.start(receiver)?;
        }
        info!(
            generation_workers = self.config.queues.generation_workers,
            formatting_workers = self.config.queues.formatting_workers,
            publishing_workers = self.config.queues.publishing_workers,
            adaptation_workers = self.config.queues.adaptation_workers,
            "🚀 Crosspost service started"
        );
        Ok(())
    }

    /// Stop every pool, letting in-flight work finish within `timeout`
    /// per pool.
    #[instrument(skip(self))]
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        for pool in &self.pools {
            pool.stop(timeout).await?;
        }
        info!("🛑 Crosspost service stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.pools.iter().any(WorkerPool::is_running)
    }

    /// Simple publication: post content on every listed platform.
    pub async fn publish(&self, request: PublishRequest) -> Result<AcceptedResponse> {
        let snapshot = self.orchestrator.create_workflow(request.to_enhanced()).await?;
        Ok(AcceptedResponse::accepted(snapshot.workflow_id))
    }

    /// Advanced publication with per-platform configuration and staging
    /// control.
    pub async fn publish_advanced(
        &self,
        request: EnhancedPublishRequest,
    ) -> Result<AcceptedResponse> {
        let snapshot = self.orchestrator.create_workflow(request).await?;
        Ok(AcceptedResponse::accepted(snapshot.workflow_id))
    }

    /// Workflow snapshot for a tracking id returned by publish.
    pub fn status(&self, request_id: Uuid) -> Result<WorkflowSnapshot> {
        self.orchestrator.status(request_id)
    }

    /// Every workflow the service currently tracks.
    pub fn list_tasks(&self) -> Vec<WorkflowSnapshot> {
        self.orchestrator.list_workflows()
    }

    pub fn workflow_metrics(&self) -> WorkflowMetrics {
        self.orchestrator.metrics()
    }

    /// Re-run a failed or cancelled workflow as a new submission.
    pub async fn retry_workflow(&self, workflow_id: Uuid) -> Result<AcceptedResponse> {
        let snapshot = self.orchestrator.retry_workflow(workflow_id).await?;
        Ok(AcceptedResponse::accepted(snapshot.workflow_id))
    }

    pub fn cancel_workflow(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        self.orchestrator.cancel_workflow(workflow_id)
    }

    pub fn list_drafts(&self) -> Vec<Draft> {
        self.drafts.list()
    }

    /// Fetch one draft. Deleted drafts stay visible in
    /// [`list_drafts`](Self::list_drafts) but resolve as not found here.
    pub fn draft(&self, draft_id: Uuid) -> Result<Draft> {
        self.drafts
            .get(draft_id)
            .filter(|draft| draft.status != DraftState::Deleted)
            .ok_or_else(|| CrosspostError::DraftNotFound {
                draft_id: draft_id.to_string(),
            })
    }

    /// Publish a staged draft; repeat calls get `DraftAlreadyPublished`.
    pub async fn publish_draft(&self, draft_id: Uuid) -> Result<AcceptedResponse> {
        let snapshot = self.orchestrator.publish_draft(draft_id).await?;
        Ok(AcceptedResponse::accepted(snapshot.workflow_id))
    }

    pub fn delete_draft(&self, draft_id: Uuid) -> Result<Draft> {
        self.drafts.delete(draft_id)
    }

    /// Standalone image adaptation outside any workflow.
    pub async fn unified_crop(&self, request: UnifiedCropRequest) -> Result<CropSubmission> {
        let task_id = self
            .orchestrator
            .submit_crop(
                request.s3_url,
                request.platform,
                request.content_type,
                request.force_refresh,
            )
            .await?;
        Ok(CropSubmission::submitted(task_id))
    }

    /// Resolve a tracking id of either kind: workflow ids first, then
    /// standalone crop task handles.
    pub fn workflow_status(&self, task_id: Uuid) -> Result<WorkflowStatusView> {
        if let Ok(snapshot) = self.orchestrator.status(task_id) {
            return Ok(WorkflowStatusView::Workflow(snapshot));
        }
        self.statuses
            .get(task_id)
            .map(WorkflowStatusView::Crop)
            .ok_or_else(|| CrosspostError::WorkflowNotFound {
                workflow_id: task_id.to_string(),
            })
    }

    /// Depth, throughput, and worker state for every queue.
    pub fn queue_status(&self) -> QueueStatus {
        let queues = self
            .queue
            .stats()
            .into_iter()
            .map(|stats| {
                let pool = self
                    .pools
                    .iter()
                    .find(|pool| pool.queue_name() == stats.queue_name);
                QueueWorkerStatus {
                    workers: self.workers_for(&stats.queue_name),
                    running: pool.map(WorkerPool::is_running).unwrap_or(false),
                    queue_name: stats.queue_name,
                    depth: stats.depth,
                    enqueued_total: stats.enqueued_total,
                }
            })
            .collect();

        QueueStatus {
            running: self.is_running(),
            queues,
        }
    }

    /// Configured/missing field summary per `(site, platform)` pair.
    /// Secret values never appear here, only field names.
    pub fn credentials_status(&self) -> Vec<CredentialsStatus> {
        self.credentials.status_report()
    }

    pub fn check_credentials(
        &self,
        site: crate::capabilities::SiteWeb,
        platform: crate::capabilities::Platform,
    ) -> CredentialsStatus {
        self.credentials.check(site, platform)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus::ok()
    }

    fn workers_for(&self, queue_name: &str) -> usize {
        match queue_name {
            queues::CONTENT_GENERATION => self.config.queues.generation_workers,
            queues::CONTENT_FORMATTING => self.config.queues.formatting_workers,
            queues::CONTENT_PUBLISHING => self.config.queues.publishing_workers,
            queues::IMAGE_ADAPTATION => self.config.queues.adaptation_workers,
            _ => 0,
        }
    }
}

impl std::fmt::Debug for CrosspostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrosspostService")
            .field("running", &self.is_running())
            .field("workflows", &self.orchestrator.metrics().total_workflows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{PublishContent, PublishOutcome, PublisherAdapter};
    use crate::capabilities::{ContentType, Platform, SiteWeb};
    use crate::credentials::{required_fields, PlatformCredentials};
    use crate::models::PlatformConfig;
    use crate::state_machine::{TaskState, WorkflowState};
    use async_trait::async_trait;
    use dashmap::DashMap;
    use image::codecs::jpeg::JpegEncoder;
    use image::{DynamicImage, RgbImage};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryRepository {
        objects: DashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl ImageRepository for MemoryRepository {
        async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
            self.objects
                .get(reference)
                .map(|e| e.clone())
                .ok_or_else(|| CrosspostError::internal(format!("missing object: {reference}")))
        }

        async fn store(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
            self.objects.insert(key.to_string(), bytes);
            Ok(key.to_string())
        }
    }

    struct StaticPublisher {
        platform: Platform,
    }

    #[async_trait]
    impl PublisherAdapter for StaticPublisher {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn publish(
            &self,
            _content: &PublishContent,
            _credentials: &PlatformCredentials,
            _idempotency_token: Option<&str>,
        ) -> Result<PublishOutcome> {
            Ok(PublishOutcome::new("post-1", None))
        }
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }));
        let mut buffer = Vec::new();
        image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, 90))
            .unwrap();
        buffer
    }

    fn credentials_for(site: SiteWeb, platform: Platform) -> PlatformCredentials {
        let values: HashMap<String, String> = required_fields(platform)
            .iter()
            .map(|&field| (field.to_string(), format!("secret-{field}")))
            .collect();
        PlatformCredentials::new(site, platform, values)
    }

    fn service_with(repository: Arc<MemoryRepository>) -> CrosspostService {
        CrosspostService::with_credentials(
            CrosspostConfig::default(),
            repository,
            CredentialStore::new(),
        )
    }

    async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
        tokio::time::timeout(deadline, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let service = service_with(Arc::new(MemoryRepository::default()));
        assert!(!service.is_running());

        service.start().unwrap();
        assert!(service.is_running());
        assert!(service.queue_status().running);

        service.stop(Duration::from_secs(2)).await.unwrap();
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_publish_runs_to_completion() {
        let service = service_with(Arc::new(MemoryRepository::default()));
        service
            .credentials()
            .insert(credentials_for(SiteWeb::Stuffgaming, Platform::Twitter));
        service
            .registry()
            .register_publisher(Arc::new(StaticPublisher {
                platform: Platform::Twitter,
            }));
        service.start().unwrap();

        let accepted = service
            .publish(PublishRequest {
                texte_source: "Annonce du jour".to_string(),
                site_web: SiteWeb::Stuffgaming,
                plateformes: vec![Platform::Twitter],
                hashtags: None,
                mentions: None,
                lien_source: None,
            })
            .await
            .unwrap();
        assert_eq!(accepted.status, "accepted");

        assert!(
            wait_until(Duration::from_secs(5), || {
                service
                    .status(accepted.request_id)
                    .map(|s| s.status == WorkflowState::Completed)
                    .unwrap_or(false)
            })
            .await
        );

        let snapshot = service.status(accepted.request_id).unwrap();
        assert_eq!(snapshot.platform_tasks.len(), 1);
        assert_eq!(
            snapshot.platform_tasks[0].result.as_ref().unwrap()["post_id"],
            "post-1"
        );
        service.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_draft_surface_stages_lists_and_deletes() {
        let service = service_with(Arc::new(MemoryRepository::default()));
        service.start().unwrap();

        let request = EnhancedPublishRequest {
            texte_source: "Brouillon de test".to_string(),
            site_web: SiteWeb::Gaming,
            platforms_config: vec![PlatformConfig::new(Platform::Twitter, ContentType::Post)],
            published: false,
        };
        let accepted = service.publish_advanced(request).await.unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || !service.list_drafts().is_empty()).await
        );
        let draft = service.list_drafts().remove(0);
        assert!(draft.simulated);
        assert_eq!(service.draft(draft.draft_id).unwrap().draft_id, draft.draft_id);

        let deleted = service.delete_draft(draft.draft_id).unwrap();
        assert_eq!(deleted.draft_id, draft.draft_id);
        let err = service.draft(draft.draft_id).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftNotFound { .. }));
        assert_eq!(err.http_status(), 404);

        let workflow = service.status(accepted.request_id).unwrap();
        assert_eq!(workflow.status, WorkflowState::Completed);
        service.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unified_crop_and_status_resolution() {
        let repository = Arc::new(MemoryRepository::default());
        repository
            .objects
            .insert("img/story.jpg".to_string(), jpeg_bytes(400, 300));
        let service = service_with(Arc::clone(&repository));
        service.start().unwrap();

        let submission = service
            .unified_crop(UnifiedCropRequest {
                s3_url: "img/story.jpg".to_string(),
                platform: Platform::Instagram,
                content_type: ContentType::Story,
                force_refresh: false,
            })
            .await
            .unwrap();
        assert_eq!(submission.status, "submitted");

        assert!(
            wait_until(Duration::from_secs(5), || {
                matches!(
                    service.workflow_status(submission.task_id),
                    Ok(WorkflowStatusView::Crop(ref status))
                        if status.state == TaskState::Completed
                )
            })
            .await
        );

        // Unknown ids stay a 404.
        let err = service.workflow_status(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.http_status(), 404);
        service.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_status_reports_every_queue() {
        let service = service_with(Arc::new(MemoryRepository::default()));
        let status = service.queue_status();
        assert!(!status.running);
        assert_eq!(status.queues.len(), queues::ALL_QUEUES.len());
        for queue in &status.queues {
            assert!(queue.workers > 0);
            assert_eq!(queue.depth, 0);
        }
    }

    #[tokio::test]
    async fn test_credentials_status_lists_field_names_only() {
        let service = service_with(Arc::new(MemoryRepository::default()));
        service
            .credentials()
            .insert(credentials_for(SiteWeb::Stuffgaming, Platform::Twitter));

        let status = service.check_credentials(SiteWeb::Stuffgaming, Platform::Twitter);
        assert!(status.configured);
        let serialized = serde_json::to_string(&status).unwrap();
        assert!(!serialized.contains("secret-"));

        let missing = service.check_credentials(SiteWeb::Football, Platform::Linkedin);
        assert!(!missing.configured);
    }
}
