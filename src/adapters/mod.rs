//! # Platform Adapters
//!
//! ## Overview
//!
//! Trait seams for everything that leaves the process: natural-language
//! content generation, per-platform formatting, the platform publish call,
//! and image byte storage. The orchestrator never talks to a platform API
//! directly; it resolves an adapter from the [`crate::registry`] and calls
//! it from a queue worker, so a slow or failing platform only ever costs
//! the one task that touched it.
//!
//! Formatting has a built-in fallback: when no [`FormatterAdapter`] is
//! registered for a platform, [`formatting::format_with_capabilities`]
//! produces deterministic output from the capability table alone.

pub mod formatting;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capabilities::{ContentType, Platform, SiteWeb};
use crate::credentials::PlatformCredentials;
use crate::error::{CrosspostError, Result};

/// Input to the formatting stage for one platform task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatRequest {
    pub site: SiteWeb,
    pub platform: Platform,
    pub content_type: ContentType,
    /// Workflow-level base content (generated or the raw source text).
    pub base_content: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub lien_source: Option<String>,
}

/// Output of the formatting stage, stored on the task for later stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedContent {
    pub platform: Platform,
    pub text: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub lien_source: Option<String>,
    pub character_count: usize,
}

/// Everything a publisher needs for one wire call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishContent {
    pub site: SiteWeb,
    pub platform: Platform,
    pub content_type: ContentType,
    pub text: String,
    /// Adapted image references, in slide order for carousels.
    pub images: Vec<String>,
    pub lien_sticker: Option<String>,
    pub titre_carousel: Option<String>,
}

/// Successful publish result as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub post_id: String,
    pub post_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PublishOutcome {
    pub fn new(post_id: impl Into<String>, post_url: Option<String>) -> Self {
        Self {
            post_id: post_id.into(),
            post_url,
            published_at: Utc::now(),
            extra: None,
        }
    }
}

/// Produces workflow-level base content from the source text.
///
/// Optional: a workflow without a registered generator uses the source
/// text verbatim as base content.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, site: SiteWeb, source_text: &str) -> Result<String>;
}

/// Per-platform content formatting.
///
/// Implementations may call out (an LLM, a template service); output text
/// is clamped to the platform character limit after the call either way.
#[async_trait]
pub trait FormatterAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn format(&self, request: &FormatRequest) -> Result<FormattedContent>;
}

/// The actual per-platform publish call.
#[async_trait]
pub trait PublisherAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Publish formatted content. On a retried call `idempotency_token`
    /// carries the same token as the first attempt so adapters that
    /// support deduplication can suppress a double post.
    async fn publish(
        &self,
        content: &PublishContent,
        credentials: &PlatformCredentials,
        idempotency_token: Option<&str>,
    ) -> Result<PublishOutcome>;

    /// Stage a native draft on the platform, returning the platform's
    /// draft reference. Only invoked for platforms whose capability entry
    /// reports native draft support.
    async fn stage_draft(
        &self,
        content: &PublishContent,
        credentials: &PlatformCredentials,
    ) -> Result<String> {
        let _ = (content, credentials);
        Err(CrosspostError::platform_api(
            self.platform().as_str(),
            "adapter does not implement native draft staging",
            false,
            None,
        ))
    }
}

impl std::fmt::Debug for dyn PublisherAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherAdapter")
            .field("platform", &self.platform())
            .finish()
    }
}

/// Object storage for image bytes (source fetch and adapted-result store).
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Fetch the raw bytes behind an image reference (URL or storage key).
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>>;

    /// Store bytes under a key and return the stable reference callers
    /// should use from now on.
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
