//! # Platform Capability Table
//!
//! Static registry of the supported platform variants and their per-variant
//! metadata: native-draft support, target image dimensions per content type,
//! and text length limit. Platforms form a closed enum so formatting and
//! dispatch decisions key off this table instead of scattered conditionals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrosspostError;

/// Supported publication platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    Facebook,
    Linkedin,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
        }
    }

    /// Prefix used in credential environment variable names.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Platform::Twitter => "TWITTER",
            Platform::Facebook => "FACEBOOK",
            Platform::Linkedin => "LINKEDIN",
            Platform::Instagram => "INSTAGRAM",
        }
    }

    pub fn all() -> &'static [Platform] {
        &[
            Platform::Twitter,
            Platform::Facebook,
            Platform::Linkedin,
            Platform::Instagram,
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CrosspostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twitter" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "linkedin" => Ok(Platform::Linkedin),
            "instagram" => Ok(Platform::Instagram),
            _ => Err(CrosspostError::validation(format!(
                "Unknown platform: {s}"
            ))),
        }
    }
}

/// Content variants a platform config can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Story,
    Carousel,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Story => "story",
            ContentType::Carousel => "carousel",
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Post
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = CrosspostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(ContentType::Post),
            "story" => Ok(ContentType::Story),
            "carousel" => Ok(ContentType::Carousel),
            _ => Err(CrosspostError::validation(format!(
                "Unknown content type: {s}"
            ))),
        }
    }
}

/// Web properties whose accounts the system publishes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteWeb {
    #[serde(rename = "stuffgaming.fr")]
    Stuffgaming,
    #[serde(rename = "gaming.com")]
    Gaming,
    #[serde(rename = "football.com")]
    Football,
}

impl SiteWeb {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteWeb::Stuffgaming => "stuffgaming.fr",
            SiteWeb::Gaming => "gaming.com",
            SiteWeb::Football => "football.com",
        }
    }

    /// Prefix used in credential environment variable names: the domain
    /// with dots replaced by underscores, upper-cased.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            SiteWeb::Stuffgaming => "STUFFGAMING_FR",
            SiteWeb::Gaming => "GAMING_COM",
            SiteWeb::Football => "FOOTBALL_COM",
        }
    }

    pub fn all() -> &'static [SiteWeb] {
        &[SiteWeb::Stuffgaming, SiteWeb::Gaming, SiteWeb::Football]
    }
}

impl fmt::Display for SiteWeb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SiteWeb {
    type Err = CrosspostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stuffgaming.fr" => Ok(SiteWeb::Stuffgaming),
            "gaming.com" => Ok(SiteWeb::Gaming),
            "football.com" => Ok(SiteWeb::Football),
            _ => Err(CrosspostError::validation(format!("Unknown site: {s}"))),
        }
    }
}

/// Exact pixel dimensions an adapted image must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
}

impl TargetDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for TargetDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-platform metadata consulted by the orchestrator and draft store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    pub platform: Platform,
    /// Whether the platform API can hold staged (unpublished) content.
    pub native_draft_support: bool,
    /// Maximum text length the platform accepts.
    pub text_limit: usize,
}

/// Static lookup over the closed platform set.
///
/// The dimension table is fixed and bit-exact; combinations absent from it
/// have no image-adaptation target and reject image-bearing configs during
/// validation.
pub struct CapabilityTable;

impl CapabilityTable {
    pub fn get(platform: Platform) -> PlatformCapabilities {
        PlatformCapabilities {
            platform,
            native_draft_support: Self::native_draft_support(platform),
            text_limit: Self::text_limit(platform),
        }
    }

    /// Only Facebook can hold unpublished content server-side; the other
    /// platforms stage drafts locally with a simulated marker.
    pub fn native_draft_support(platform: Platform) -> bool {
        matches!(platform, Platform::Facebook)
    }

    pub fn text_limit(platform: Platform) -> usize {
        match platform {
            Platform::Twitter => 280,
            Platform::Instagram => 2_200,
            Platform::Linkedin => 3_000,
            Platform::Facebook => 63_206,
        }
    }

    /// Content types the platform accepts at all.
    pub fn supports_content_type(platform: Platform, content_type: ContentType) -> bool {
        match platform {
            Platform::Instagram => true,
            Platform::Twitter | Platform::Facebook | Platform::Linkedin => {
                content_type == ContentType::Post
            }
        }
    }

    /// Target image dimensions for a platform/content-type pair.
    ///
    /// Carousel targets apply per slide. `None` means the pair has no
    /// image-adaptation entry.
    pub fn target_dimensions(
        platform: Platform,
        content_type: ContentType,
    ) -> Option<TargetDimensions> {
        match (platform, content_type) {
            (Platform::Instagram, ContentType::Post) => Some(TargetDimensions::new(1080, 1080)),
            (Platform::Instagram, ContentType::Story) => Some(TargetDimensions::new(1080, 1920)),
            (Platform::Instagram, ContentType::Carousel) => Some(TargetDimensions::new(1080, 1080)),
            (Platform::Twitter, ContentType::Post) => Some(TargetDimensions::new(1200, 675)),
            (Platform::Facebook, ContentType::Post) => Some(TargetDimensions::new(1200, 630)),
            _ => None,
        }
    }
}
