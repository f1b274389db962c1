//! # Publication Requests
//!
//! Wire-facing request types for the simple and advanced publish surfaces.
//! Serialized field names keep the upstream wire format (`texte_source`,
//! `site_web`, `plateformes`) for compatibility with existing producers.

use serde::{Deserialize, Serialize};

use crate::capabilities::{CapabilityTable, ContentType, Platform, SiteWeb};
use crate::constants::system;
use crate::error::{CrosspostError, Result};

/// Configuration for one target platform inside an advanced request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform: Platform,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lien_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lien_sticker: Option<String>,

    // Carousel configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_slides: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titre_carousel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_urls: Option<Vec<String>>,

    // Single-image posts (object-storage reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_s3_url: Option<String>,

    /// Overrides the request-level `published` default only when explicitly
    /// set; absent means inherit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl PlatformConfig {
    pub fn new(platform: Platform, content_type: ContentType) -> Self {
        Self {
            platform,
            content_type,
            hashtags: None,
            mentions: None,
            lien_source: None,
            lien_sticker: None,
            nb_slides: None,
            titre_carousel: None,
            images_urls: None,
            image_s3_url: None,
            published: None,
        }
    }

    pub fn with_hashtags(mut self, hashtags: Vec<String>) -> Self {
        self.hashtags = Some(hashtags);
        self
    }

    pub fn with_image(mut self, s3_url: impl Into<String>) -> Self {
        self.image_s3_url = Some(s3_url.into());
        self
    }

    pub fn with_carousel(mut self, nb_slides: u32, images_urls: Option<Vec<String>>) -> Self {
        self.nb_slides = Some(nb_slides);
        self.images_urls = images_urls;
        self
    }

    pub fn with_published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    /// Resolve the staging decision against the request-level default.
    pub fn effective_published(&self, request_default: bool) -> bool {
        self.published.unwrap_or(request_default)
    }

    /// Source image references, carousel list first.
    pub fn image_sources(&self) -> Vec<String> {
        if let Some(urls) = &self.images_urls {
            urls.clone()
        } else if let Some(url) = &self.image_s3_url {
            vec![url.clone()]
        } else {
            Vec::new()
        }
    }

    pub fn has_images(&self) -> bool {
        !self.image_sources().is_empty()
    }

    /// Slide count for carousels: explicit `nb_slides`, else the image list.
    pub fn slide_count(&self) -> Option<u32> {
        self.nb_slides
            .or_else(|| self.images_urls.as_ref().map(|urls| urls.len() as u32))
    }
}

/// Simple multi-platform publication request: one shared text, post-type
/// content on every listed platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub texte_source: String,
    pub site_web: SiteWeb,
    pub plateformes: Vec<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lien_source: Option<String>,
}

impl PublishRequest {
    /// Convert to the advanced request shape, one post config per platform.
    pub fn to_enhanced(&self) -> EnhancedPublishRequest {
        let platforms_config = self
            .plateformes
            .iter()
            .map(|&platform| PlatformConfig {
                platform,
                content_type: ContentType::Post,
                hashtags: self.hashtags.clone(),
                mentions: self.mentions.clone(),
                lien_source: self.lien_source.clone(),
                lien_sticker: None,
                nb_slides: None,
                titre_carousel: None,
                images_urls: None,
                image_s3_url: None,
                published: None,
            })
            .collect();

        EnhancedPublishRequest {
            texte_source: self.texte_source.clone(),
            site_web: self.site_web,
            platforms_config,
            published: true,
        }
    }
}

fn default_published() -> bool {
    true
}

/// Advanced publication request with per-platform configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedPublishRequest {
    pub texte_source: String,
    pub site_web: SiteWeb,
    pub platforms_config: Vec<PlatformConfig>,
    /// Request-level staging default; `false` stages every config as a draft
    /// unless a config sets its own flag.
    #[serde(default = "default_published")]
    pub published: bool,
}

impl EnhancedPublishRequest {
    pub fn platforms(&self) -> Vec<Platform> {
        self.platforms_config.iter().map(|c| c.platform).collect()
    }

    /// Reject malformed requests before any task is created.
    pub fn validate(&self) -> Result<()> {
        if self.texte_source.trim().is_empty() {
            return Err(CrosspostError::validation("texte_source must not be empty"));
        }
        if self.platforms_config.is_empty() {
            return Err(CrosspostError::validation(
                "at least one platform config is required",
            ));
        }
        if self.platforms_config.len() > system::MAX_PLATFORM_CONFIGS {
            return Err(CrosspostError::validation(format!(
                "too many platform configs: {} exceeds limit of {}",
                self.platforms_config.len(),
                system::MAX_PLATFORM_CONFIGS
            )));
        }

        // Task ids derive from (workflow, platform), so a platform may appear
        // at most once per request.
        let mut seen: Vec<Platform> = Vec::new();
        for config in &self.platforms_config {
            if seen.contains(&config.platform) {
                return Err(CrosspostError::validation(format!(
                    "duplicate platform config: {}",
                    config.platform
                )));
            }
            seen.push(config.platform);

            self.validate_config(config)?;
        }

        Ok(())
    }

    fn validate_config(&self, config: &PlatformConfig) -> Result<()> {
        if !CapabilityTable::supports_content_type(config.platform, config.content_type) {
            return Err(CrosspostError::validation(format!(
                "{} does not support content type {}",
                config.platform, config.content_type
            )));
        }

        if config.content_type == ContentType::Carousel {
            let slides = config.slide_count().ok_or_else(|| {
                CrosspostError::validation(
                    "carousel config requires nb_slides or an images_urls list",
                )
            })?;
            if slides == 0 || slides > system::MAX_CAROUSEL_SLIDES {
                return Err(CrosspostError::validation(format!(
                    "carousel slide count {} outside 1..={}",
                    slides,
                    system::MAX_CAROUSEL_SLIDES
                )));
            }
            if let (Some(nb), Some(urls)) = (config.nb_slides, &config.images_urls) {
                if nb as usize != urls.len() {
                    return Err(CrosspostError::validation(format!(
                        "nb_slides {} does not match {} images_urls entries",
                        nb,
                        urls.len()
                    )));
                }
            }
        } else if config.images_urls.is_some() {
            return Err(CrosspostError::validation(
                "images_urls is only valid for carousel content",
            ));
        }

        if config.has_images()
            && CapabilityTable::target_dimensions(config.platform, config.content_type).is_none()
        {
            return Err(CrosspostError::validation(format!(
                "no image dimension entry for {}/{}",
                config.platform, config.content_type
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(configs: Vec<PlatformConfig>) -> EnhancedPublishRequest {
        EnhancedPublishRequest {
            texte_source: "Annonce du jour".to_string(),
            site_web: SiteWeb::Stuffgaming,
            platforms_config: configs,
            published: true,
        }
    }

    #[test]
    fn test_simple_request_converts_to_post_configs() {
        let simple = PublishRequest {
            texte_source: "Nouveau test".to_string(),
            site_web: SiteWeb::Football,
            plateformes: vec![Platform::Twitter, Platform::Facebook],
            hashtags: Some(vec!["#Football".to_string()]),
            mentions: None,
            lien_source: Some("https://football.com/article".to_string()),
        };

        let enhanced = simple.to_enhanced();
        assert_eq!(enhanced.platforms_config.len(), 2);
        assert!(enhanced.published);
        for config in &enhanced.platforms_config {
            assert_eq!(config.content_type, ContentType::Post);
            assert_eq!(config.hashtags, Some(vec!["#Football".to_string()]));
            assert!(config.published.is_none());
        }
    }

    #[test]
    fn test_zero_platform_configs_rejected() {
        let request = request_with(vec![]);
        let err = request.validate().unwrap_err();
        assert!(matches!(err, CrosspostError::Validation { .. }));
    }

    #[test]
    fn test_duplicate_platform_rejected() {
        let request = request_with(vec![
            PlatformConfig::new(Platform::Twitter, ContentType::Post),
            PlatformConfig::new(Platform::Twitter, ContentType::Post),
        ]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unsupported_content_type_rejected() {
        let request = request_with(vec![PlatformConfig::new(
            Platform::Twitter,
            ContentType::Carousel,
        )]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_carousel_requires_slides() {
        let bare = request_with(vec![PlatformConfig::new(
            Platform::Instagram,
            ContentType::Carousel,
        )]);
        assert!(bare.validate().is_err());

        let with_slides = request_with(vec![
            PlatformConfig::new(Platform::Instagram, ContentType::Carousel).with_carousel(3, None),
        ]);
        assert!(with_slides.validate().is_ok());
    }

    #[test]
    fn test_carousel_slide_count_must_match_images() {
        let mismatch = request_with(vec![PlatformConfig::new(
            Platform::Instagram,
            ContentType::Carousel,
        )
        .with_carousel(
            3,
            Some(vec![
                "s3://imgs/a.jpg".to_string(),
                "s3://imgs/b.jpg".to_string(),
            ]),
        )]);
        assert!(mismatch.validate().is_err());
    }

    #[test]
    fn test_images_on_dimensionless_combination_rejected() {
        let request = request_with(vec![PlatformConfig::new(
            Platform::Linkedin,
            ContentType::Post,
        )
        .with_image("s3://imgs/a.jpg")]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_effective_published_inherits_unless_set() {
        let config = PlatformConfig::new(Platform::Facebook, ContentType::Post);
        assert!(config.effective_published(true));
        assert!(!config.effective_published(false));

        let pinned = config.with_published(true);
        assert!(pinned.effective_published(false));
    }

    #[test]
    fn test_published_field_absent_from_wire_when_unset() {
        let config = PlatformConfig::new(Platform::Facebook, ContentType::Post);
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("published").is_none());

        let parsed: PlatformConfig =
            serde_json::from_value(serde_json::json!({"platform": "facebook"})).unwrap();
        assert_eq!(parsed.content_type, ContentType::Post);
        assert!(parsed.published.is_none());
    }
}
