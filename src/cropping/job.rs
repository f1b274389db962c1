//! Crop job description and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capabilities::{CapabilityTable, ContentType, Platform, TargetDimensions};
use crate::error::{CrosspostError, Result};

/// Which strategy produced an adapted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStrategyKind {
    SaliencyGuided,
    HeuristicRegion,
    CenterCrop,
    PassThrough,
}

impl CropStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropStrategyKind::SaliencyGuided => "saliency_guided",
            CropStrategyKind::HeuristicRegion => "heuristic_region",
            CropStrategyKind::CenterCrop => "center_crop",
            CropStrategyKind::PassThrough => "pass_through",
        }
    }
}

impl std::fmt::Display for CropStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One image adaptation: a source reference and the platform target it
/// must be shaped for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropJob {
    /// Source image reference (URL or storage key).
    pub source: String,
    pub platform: Platform,
    pub content_type: ContentType,
    /// Slide position for carousel jobs.
    pub slide_index: Option<u32>,
    pub target: TargetDimensions,
}

impl CropJob {
    /// Build a job for a (platform, content type) pair, resolving the
    /// target from the capability table. Combinations without a dimension
    /// entry are rejected.
    pub fn new(
        source: impl Into<String>,
        platform: Platform,
        content_type: ContentType,
    ) -> Result<Self> {
        Self::build(source, platform, content_type, None)
    }

    /// Build a job for one carousel slide.
    pub fn for_slide(
        source: impl Into<String>,
        platform: Platform,
        content_type: ContentType,
        slide_index: u32,
    ) -> Result<Self> {
        Self::build(source, platform, content_type, Some(slide_index))
    }

    fn build(
        source: impl Into<String>,
        platform: Platform,
        content_type: ContentType,
        slide_index: Option<u32>,
    ) -> Result<Self> {
        let target = CapabilityTable::target_dimensions(platform, content_type).ok_or_else(
            || {
                CrosspostError::validation(format!(
                    "No target dimensions for {} {}",
                    platform.as_str(),
                    content_type.as_str()
                ))
            },
        )?;

        Ok(Self {
            source: source.into(),
            platform,
            content_type,
            slide_index,
            target,
        })
    }

    /// Cache and singleflight key. Identical jobs share one computation
    /// and one cached result.
    pub fn cache_key(&self) -> String {
        match self.slide_index {
            Some(index) => format!(
                "{}:{}:{}#slide{}",
                self.platform.as_str(),
                self.content_type.as_str(),
                self.source,
                index
            ),
            None => format!(
                "{}:{}:{}",
                self.platform.as_str(),
                self.content_type.as_str(),
                self.source
            ),
        }
    }
}

/// Completed adaptation, cached under the job's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropResult {
    pub cache_key: String,
    /// Reference to the stored adapted image.
    pub result_reference: String,
    pub strategy: CropStrategyKind,
    pub width: u32,
    pub height: u32,
    pub completed_at: DateTime<Utc>,
}
