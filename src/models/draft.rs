//! # Drafts
//!
//! Staged, not-yet-published content for one platform. Platforms without a
//! native staging API still get a Draft here, marked `simulated`, so callers
//! see one uniform abstraction. Every draft carries the content-quality
//! analysis computed at creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::{ContentType, Platform, SiteWeb};
use crate::state_machine::DraftState;

/// Content payload staged in a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftContent {
    pub text: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lien_source: Option<String>,
    /// Adapted image references, when image work ran before staging.
    #[serde(default)]
    pub images: Vec<String>,
}

impl DraftContent {
    pub fn text_only(text: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            text: text.into(),
            content_type,
            hashtags: Vec::new(),
            mentions: Vec::new(),
            lien_source: None,
            images: Vec::new(),
        }
    }
}

/// Deterministic content-quality analysis attached to every draft.
///
/// Derived purely from character/hashtag/mention/emoji counts against the
/// platform's limits; no external calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub character_count: usize,
    pub character_limit: usize,
    pub within_limit: bool,
    pub hashtag_count: usize,
    pub mention_count: usize,
    pub emoji_count: usize,
    /// Quality score from 0 (unusable) to 100.
    pub quality_score: u8,
    pub recommendations: Vec<String>,
}

/// Staged content for one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub draft_id: Uuid,
    pub platform: Platform,
    pub site: SiteWeb,
    pub content: DraftContent,
    pub status: DraftState,
    /// True when the platform has no native staging API and this draft only
    /// exists locally.
    pub simulated: bool,
    /// Platform-side draft id when staging went through a native API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_reference: Option<String>,
    pub analysis: ContentAnalysis,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Workflow that published this draft, once it leaves `draft`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_workflow_id: Option<Uuid>,
}

impl Draft {
    pub fn new(
        platform: Platform,
        site: SiteWeb,
        content: DraftContent,
        simulated: bool,
        analysis: ContentAnalysis,
    ) -> Self {
        Self {
            draft_id: Uuid::new_v4(),
            platform,
            site,
            content,
            status: DraftState::Draft,
            simulated,
            native_reference: None,
            analysis,
            created_at: Utc::now(),
            published_at: None,
            deleted_at: None,
            published_workflow_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
