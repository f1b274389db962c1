//! Draft registry and state machine.
//!
//! One entry per staged draft, keyed by id. Transitions are guarded by
//! [`DraftState`]: a draft leaves the `draft` state exactly once, to
//! `published` or `deleted`, and both destinations are terminal. Deleted
//! drafts stay in the registry as tombstones so their ids keep reporting
//! a state instead of silently vanishing from listings.

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::capabilities::{CapabilityTable, Platform, SiteWeb};
use crate::drafts::analysis::analyze_content;
use crate::error::{CrosspostError, Result};
use crate::events::{EventPublisher, PublicationEvent};
use crate::models::{Draft, DraftContent};
use crate::state_machine::DraftState;

/// Input for staging a new draft.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub site: SiteWeb,
    pub platform: Platform,
    pub content: DraftContent,
    /// Platform-side draft id, when a native staging call already ran.
    pub native_reference: Option<String>,
}

impl NewDraft {
    pub fn new(site: SiteWeb, platform: Platform, content: DraftContent) -> Self {
        Self {
            site,
            platform,
            content,
            native_reference: None,
        }
    }

    pub fn with_native_reference(mut self, reference: impl Into<String>) -> Self {
        self.native_reference = Some(reference.into());
        self
    }
}

/// Concurrent draft registry shared by workers and the service facade.
pub struct DraftStore {
    drafts: DashMap<Uuid, Draft>,
    events: EventPublisher,
}

impl DraftStore {
    pub fn new(events: EventPublisher) -> Self {
        Self {
            drafts: DashMap::new(),
            events,
        }
    }

    /// Stage a draft, computing its quality analysis up front.
    pub fn create(&self, new_draft: NewDraft) -> Draft {
        let simulated = !CapabilityTable::native_draft_support(new_draft.platform);
        let analysis = analyze_content(new_draft.platform, &new_draft.content.text);

        let mut draft = Draft::new(
            new_draft.platform,
            new_draft.site,
            new_draft.content,
            simulated,
            analysis,
        );
        draft.native_reference = new_draft.native_reference;
        self.drafts.insert(draft.draft_id, draft.clone());

        info!(
            draft_id = %draft.draft_id,
            platform = draft.platform.as_str(),
            site = draft.site.as_str(),
            simulated,
            quality_score = draft.analysis.quality_score,
            "📝 Draft staged"
        );
        self.events.publish(PublicationEvent::DraftCreated {
            draft_id: draft.draft_id,
            platform: draft.platform,
            simulated,
        });
        draft
    }

    pub fn get(&self, draft_id: Uuid) -> Option<Draft> {
        self.drafts.get(&draft_id).map(|entry| entry.clone())
    }

    /// All drafts, oldest first. Includes published and deleted entries.
    pub fn list(&self) -> Vec<Draft> {
        let mut drafts: Vec<Draft> = self
            .drafts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drafts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.draft_id.cmp(&b.draft_id))
        });
        drafts
    }

    /// Transition `draft -> published`, recording the workflow that
    /// carries the content out.
    pub fn mark_published(&self, draft_id: Uuid, workflow_id: Option<Uuid>) -> Result<Draft> {
        let published = {
            let mut entry =
                self.drafts
                    .get_mut(&draft_id)
                    .ok_or_else(|| CrosspostError::DraftNotFound {
                        draft_id: draft_id.to_string(),
                    })?;
            match entry.status {
                DraftState::Published => {
                    return Err(CrosspostError::DraftAlreadyPublished { draft_id });
                }
                DraftState::Deleted => {
                    return Err(CrosspostError::DraftNotFound {
                        draft_id: draft_id.to_string(),
                    });
                }
                DraftState::Draft => {
                    entry.status = DraftState::Published;
                    entry.published_at = Some(Utc::now());
                    entry.published_workflow_id = workflow_id;
                    entry.clone()
                }
            }
        };

        info!(
            draft_id = %draft_id,
            workflow_id = ?workflow_id,
            "📤 Draft published"
        );
        self.events.publish(PublicationEvent::DraftPublished {
            draft_id,
            workflow_id,
        });
        Ok(published)
    }

    /// Transition `draft -> deleted`. Published drafts refuse with
    /// `DraftAlreadyPublished`; deleted or unknown ids report not found.
    pub fn delete(&self, draft_id: Uuid) -> Result<Draft> {
        let deleted = {
            let mut entry =
                self.drafts
                    .get_mut(&draft_id)
                    .ok_or_else(|| CrosspostError::DraftNotFound {
                        draft_id: draft_id.to_string(),
                    })?;
            match entry.status {
                DraftState::Published => {
                    return Err(CrosspostError::DraftAlreadyPublished { draft_id });
                }
                DraftState::Deleted => {
                    return Err(CrosspostError::DraftNotFound {
                        draft_id: draft_id.to_string(),
                    });
                }
                DraftState::Draft => {
                    entry.status = DraftState::Deleted;
                    entry.deleted_at = Some(Utc::now());
                    entry.clone()
                }
            }
        };

        info!(draft_id = %draft_id, "🗑️ Draft deleted");
        self.events
            .publish(PublicationEvent::DraftDeleted { draft_id });
        Ok(deleted)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("drafts", &self.drafts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ContentType;

    fn new_draft(platform: Platform) -> NewDraft {
        NewDraft::new(
            SiteWeb::Stuffgaming,
            platform,
            DraftContent::text_only(
                "Tournament recap going live tonight #Gaming 🎮",
                ContentType::Post,
            ),
        )
    }

    fn store() -> DraftStore {
        DraftStore::new(EventPublisher::default())
    }

    #[test]
    fn test_create_marks_simulated_from_capability_table() {
        let store = store();
        let twitter = store.create(new_draft(Platform::Twitter));
        let facebook = store.create(
            new_draft(Platform::Facebook).with_native_reference("fb-draft-991"),
        );

        assert!(twitter.simulated);
        assert!(twitter.native_reference.is_none());
        assert!(!facebook.simulated);
        assert_eq!(facebook.native_reference.as_deref(), Some("fb-draft-991"));
        assert_eq!(twitter.status, DraftState::Draft);
        assert!(twitter.analysis.quality_score > 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_publish_is_terminal() {
        let store = store();
        let draft = store.create(new_draft(Platform::Twitter));
        let workflow_id = Uuid::new_v4();

        let published = store
            .mark_published(draft.draft_id, Some(workflow_id))
            .unwrap();
        assert_eq!(published.status, DraftState::Published);
        assert_eq!(published.published_workflow_id, Some(workflow_id));
        assert!(published.published_at.is_some());

        let err = store.mark_published(draft.draft_id, None).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftAlreadyPublished { .. }));

        let err = store.delete(draft.draft_id).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftAlreadyPublished { .. }));
    }

    #[test]
    fn test_delete_is_terminal_and_not_idempotent() {
        let store = store();
        let draft = store.create(new_draft(Platform::Instagram));

        let deleted = store.delete(draft.draft_id).unwrap();
        assert_eq!(deleted.status, DraftState::Deleted);
        assert!(deleted.deleted_at.is_some());

        let err = store.delete(draft.draft_id).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftNotFound { .. }));

        let err = store.mark_published(draft.draft_id, None).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftNotFound { .. }));

        // Tombstone stays visible.
        assert_eq!(
            store.get(draft.draft_id).unwrap().status,
            DraftState::Deleted
        );
    }

    #[test]
    fn test_unknown_draft_reports_not_found() {
        let store = store();
        let err = store.mark_published(Uuid::new_v4(), None).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftNotFound { .. }));
        let err = store.delete(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CrosspostError::DraftNotFound { .. }));
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_list_returns_oldest_first() {
        let store = store();
        let first = store.create(new_draft(Platform::Twitter));
        let second = store.create(new_draft(Platform::Linkedin));

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at <= listed[1].created_at);
        let ids: Vec<Uuid> = listed.iter().map(|d| d.draft_id).collect();
        assert!(ids.contains(&first.draft_id));
        assert!(ids.contains(&second.draft_id));
    }
}
