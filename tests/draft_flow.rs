//! # Draft Flow Integration Tests
//!
//! Staging instead of publishing: native versus simulated drafts, the
//! draft-to-publication workflow, credential gating, and the once-only
//! publish transition.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use uuid::Uuid;

use crosspost_core::api::CrosspostService;
use crosspost_core::capabilities::{ContentType, Platform, SiteWeb};
use crosspost_core::error::CrosspostError;
use crosspost_core::events::PublicationEvent;
use crosspost_core::models::{EnhancedPublishRequest, PlatformConfig};
use crosspost_core::state_machine::{DraftState, TaskState, WorkflowState};

use common::{
    credentials_for, jpeg_bytes, service, wait_until, MemoryRepository, ScriptedPublisher,
};

fn staging_request(platforms: &[Platform]) -> EnhancedPublishRequest {
    EnhancedPublishRequest {
        texte_source: "Brouillon de la semaine".to_string(),
        site_web: SiteWeb::Football,
        platforms_config: platforms
            .iter()
            .map(|&p| PlatformConfig::new(p, ContentType::Post))
            .collect(),
        published: false,
    }
}

async fn wait_for_state(
    service: &CrosspostService,
    workflow_id: Uuid,
    state: WorkflowState,
) -> bool {
    wait_until(Duration::from_secs(10), || {
        service
            .status(workflow_id)
            .map(|s| s.status == state)
            .unwrap_or(false)
    })
    .await
}

#[tokio::test]
async fn unpublished_request_stages_one_draft_per_platform() -> Result<()> {
    let repository = Arc::new(
        MemoryRepository::default()
            .with_object("img/s0.jpg", jpeg_bytes(600, 400))
            .with_object("img/s1.jpg", jpeg_bytes(400, 600))
            .with_object("img/s2.jpg", jpeg_bytes(500, 500)),
    );
    let service = service(repository.clone());
    // Facebook stages through its platform API, so it alone needs
    // credentials and a publisher; the simulated platforms need neither.
    service
        .credentials()
        .insert(credentials_for(SiteWeb::Football, Platform::Facebook));
    let facebook = Arc::new(ScriptedPublisher::succeeding(Platform::Facebook));
    service.registry().register_publisher(facebook.clone());
    service.start()?;

    let mut events = service.events().subscribe();
    let accepted = service
        .publish_advanced(EnhancedPublishRequest {
            texte_source: "Brouillon de la semaine".to_string(),
            site_web: SiteWeb::Football,
            platforms_config: vec![
                PlatformConfig::new(Platform::Facebook, ContentType::Post),
                PlatformConfig::new(Platform::Instagram, ContentType::Carousel).with_carousel(
                    3,
                    Some(vec![
                        "img/s0.jpg".to_string(),
                        "img/s1.jpg".to_string(),
                        "img/s2.jpg".to_string(),
                    ]),
                ),
                PlatformConfig::new(Platform::Twitter, ContentType::Post),
            ],
            published: false,
        })
        .await?;

    assert!(
        wait_for_state(&service, accepted.request_id, WorkflowState::Completed).await,
        "staging workflow never completed"
    );

    let drafts = service.list_drafts();
    assert_eq!(drafts.len(), 3);
    for draft in &drafts {
        assert_eq!(draft.status, DraftState::Draft);
        assert!(draft.analysis.character_count > 0);
        assert_eq!(
            draft.analysis.character_limit,
            crosspost_core::capabilities::CapabilityTable::text_limit(draft.platform)
        );
        if draft.platform == Platform::Facebook {
            assert!(!draft.simulated);
            assert_eq!(draft.native_reference.as_deref(), Some("facebook-draft-0"));
        } else {
            assert!(draft.simulated);
            assert_eq!(draft.native_reference, None);
        }
    }

    // The carousel draft staged its three adapted slides.
    let instagram = drafts
        .iter()
        .find(|d| d.platform == Platform::Instagram)
        .unwrap();
    assert_eq!(instagram.content.content_type, ContentType::Carousel);
    assert_eq!(instagram.content.images.len(), 3);
    assert_eq!(repository.store_calls.load(Ordering::SeqCst), 3);

    // Task results link back to the staged drafts, and nothing was
    // actually published.
    let snapshot = service.status(accepted.request_id)?;
    for task in &snapshot.platform_tasks {
        let result = task.result.as_ref().unwrap();
        let draft_id: Uuid = result["draft_id"].as_str().unwrap().parse()?;
        let draft = service.draft(draft_id)?;
        assert_eq!(draft.platform, task.platform);
        assert_eq!(
            result["simulated"].as_bool().unwrap(),
            task.platform != Platform::Facebook
        );
    }
    assert_eq!(facebook.staged_natively.load(Ordering::SeqCst), 1);
    assert_eq!(facebook.calls.load(Ordering::SeqCst), 0);

    let mut created = 0;
    while let Ok(envelope) = events.try_recv() {
        if matches!(envelope.event, PublicationEvent::DraftCreated { .. }) {
            created += 1;
        }
    }
    assert_eq!(created, 3);

    service.stop(Duration::from_secs(2)).await?;
    Ok(())
}

#[tokio::test]
async fn draft_publication_consumes_the_staged_draft() -> Result<()> {
    let service = service(Arc::new(MemoryRepository::default()));
    service.start()?;

    let staged = service
        .publish_advanced(staging_request(&[Platform::Twitter]))
        .await?;
    assert!(wait_for_state(&service, staged.request_id, WorkflowState::Completed).await);
    let draft = service.list_drafts().remove(0);
    assert_eq!(draft.status, DraftState::Draft);

    // Publication needs what staging did not: credentials and a live
    // publisher.
    service
        .credentials()
        .insert(credentials_for(SiteWeb::Football, Platform::Twitter));
    let publisher = Arc::new(ScriptedPublisher::succeeding(Platform::Twitter));
    service.registry().register_publisher(publisher.clone());

    let published = service.publish_draft(draft.draft_id).await?;
    assert_ne!(published.request_id, staged.request_id);
    assert!(
        wait_for_state(&service, published.request_id, WorkflowState::Completed).await,
        "draft publication never completed"
    );

    let after = service.draft(draft.draft_id)?;
    assert_eq!(after.status, DraftState::Published);
    assert_eq!(after.published_workflow_id, Some(published.request_id));
    assert!(after.published_at.is_some());

    // The platform got the draft's formatted text exactly once, and no
    // second copy was staged along the way.
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(publisher.texts.lock()[0], draft.content.text);
    assert_eq!(service.list_drafts().len(), 1);

    // Published is final: no second publication, no new workflow from the
    // refused attempt, no deletion.
    let err = service.publish_draft(draft.draft_id).await.unwrap_err();
    assert!(matches!(err, CrosspostError::DraftAlreadyPublished { .. }));
    assert_eq!(err.http_status(), 409);
    assert_eq!(service.list_tasks().len(), 2);
    let err = service.delete_draft(draft.draft_id).unwrap_err();
    assert!(matches!(err, CrosspostError::DraftAlreadyPublished { .. }));

    service.stop(Duration::from_secs(2)).await?;
    Ok(())
}

#[tokio::test]
async fn native_draft_staging_requires_credentials() -> Result<()> {
    let service = service(Arc::new(MemoryRepository::default()));
    service.start()?;

    // No facebook credentials: its native staging fails at creation while
    // the simulated twitter draft still goes through.
    let accepted = service
        .publish_advanced(staging_request(&[Platform::Facebook, Platform::Twitter]))
        .await?;

    assert!(
        wait_for_state(&service, accepted.request_id, WorkflowState::PartialFailure).await,
        "workflow never settled"
    );

    let snapshot = service.status(accepted.request_id)?;
    let facebook = snapshot
        .platform_tasks
        .iter()
        .find(|t| t.platform == Platform::Facebook)
        .unwrap();
    assert_eq!(facebook.status, TaskState::Failed);
    assert!(facebook
        .error
        .as_ref()
        .unwrap()
        .contains("Credentials not configured"));

    let drafts = service.list_drafts();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].platform, Platform::Twitter);

    service.stop(Duration::from_secs(2)).await?;
    Ok(())
}

#[tokio::test]
async fn publish_draft_without_credentials_leaves_draft_staged() -> Result<()> {
    let service = service(Arc::new(MemoryRepository::default()));
    service.start()?;

    let staged = service
        .publish_advanced(staging_request(&[Platform::Twitter]))
        .await?;
    assert!(wait_for_state(&service, staged.request_id, WorkflowState::Completed).await);
    let draft = service.list_drafts().remove(0);

    let err = service.publish_draft(draft.draft_id).await.unwrap_err();
    assert!(matches!(err, CrosspostError::Credentials { .. }));
    assert_eq!(err.http_status(), 422);

    // The refusal happened before the draft transition: it is still
    // staged and no publication workflow exists for it.
    let after = service.draft(draft.draft_id)?;
    assert_eq!(after.status, DraftState::Draft);
    assert_eq!(after.published_workflow_id, None);
    assert_eq!(service.list_tasks().len(), 1);

    let err = service.publish_draft(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.http_status(), 404);

    service.stop(Duration::from_secs(2)).await?;
    Ok(())
}
