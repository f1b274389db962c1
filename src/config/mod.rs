//! # Configuration
//!
//! Explicit, validated configuration for the publication system: worker
//! pool sizes, queue capacity, retry/backoff tuning, task timeouts, and
//! crop-engine parameters.
//!
//! ## Sources
//!
//! Values are layered through the `config` crate: compiled-in defaults,
//! an optional `crosspost.{toml,yaml,json}` file, then environment
//! overrides under the `CROSSPOST` prefix with `__` separating nested
//! keys (`CROSSPOST_QUEUES__CAPACITY=512`). Loading validates the merged
//! result; a config that passes [`CrosspostConfig::validate`] is the only
//! one the system will run with.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::{CrosspostError, Result};

/// Worker pool sizes and queue capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Bounded capacity per queue; senders wait when full.
    pub capacity: usize,
    pub generation_workers: usize,
    pub formatting_workers: usize,
    pub publishing_workers: usize,
    pub adaptation_workers: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: defaults::QUEUE_CAPACITY,
            generation_workers: defaults::CONTENT_GENERATION_WORKERS,
            formatting_workers: defaults::CONTENT_FORMATTING_WORKERS,
            publishing_workers: defaults::CONTENT_PUBLISHING_WORKERS,
            adaptation_workers: defaults::IMAGE_ADAPTATION_WORKERS,
        }
    }
}

/// Per-task execution limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub timeout_seconds: u64,
    /// Retry ceiling for idempotent task categories.
    pub max_retry_attempts: u32,
    /// Extra attempts granted to publish tasks beyond the first.
    pub publish_extra_retries: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: defaults::TASK_TIMEOUT_SECONDS,
            max_retry_attempts: defaults::MAX_RETRY_ATTEMPTS,
            publish_extra_retries: defaults::PUBLISH_EXTRA_RETRIES,
        }
    }
}

/// Exponential backoff tuning for task retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub base_delay_seconds: u32,
    pub max_delay_seconds: u32,
    pub multiplier: f64,
    pub jitter_enabled: bool,
    /// Maximum jitter as a fraction of the computed delay (0.0 to 1.0).
    pub max_jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_seconds: defaults::BACKOFF_BASE_DELAY_SECONDS as u32,
            max_delay_seconds: defaults::BACKOFF_MAX_DELAY_SECONDS as u32,
            multiplier: defaults::BACKOFF_MULTIPLIER,
            jitter_enabled: true,
            max_jitter: defaults::BACKOFF_MAX_JITTER,
        }
    }
}

/// Crop-engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSettings {
    /// JPEG quality for re-encoded results (1-100).
    pub jpeg_quality: u8,
    /// Minimum energy share before the saliency strategy trusts itself.
    pub saliency_confidence_threshold: f64,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: defaults::JPEG_QUALITY,
            saliency_confidence_threshold: defaults::SALIENCY_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Top-level configuration for the publication system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosspostConfig {
    pub queues: QueueSettings,
    pub tasks: TaskSettings,
    pub backoff: BackoffSettings,
    pub crop: CropSettings,
}

impl CrosspostConfig {
    /// Load with file discovery (`crosspost.*` in the working directory)
    /// and `CROSSPOST`-prefixed environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_with_file(None)
    }

    /// Load from an explicit file path plus environment overrides. The
    /// file is required when named; discovery otherwise.
    pub fn load_with_file(path: Option<&str>) -> Result<Self> {
        let file_source = match path {
            Some(path) => File::with_name(path),
            None => File::with_name("crosspost").required(false),
        };

        let merged = Config::builder()
            .add_source(file_source)
            .add_source(Environment::with_prefix("CROSSPOST").separator("__"))
            .build()
            .map_err(|err| CrosspostError::configuration("sources", err.to_string()))?;

        let config: Self = merged
            .try_deserialize()
            .map_err(|err| CrosspostError::configuration("deserialize", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the system cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queues.capacity == 0 {
            return Err(CrosspostError::configuration(
                "queues",
                "capacity must be at least 1",
            ));
        }
        let workers = [
            ("generation_workers", self.queues.generation_workers),
            ("formatting_workers", self.queues.formatting_workers),
            ("publishing_workers", self.queues.publishing_workers),
            ("adaptation_workers", self.queues.adaptation_workers),
        ];
        for (name, count) in workers {
            if count == 0 {
                return Err(CrosspostError::configuration(
                    "queues",
                    format!("{name} must be at least 1"),
                ));
            }
        }

        if self.tasks.timeout_seconds == 0 {
            return Err(CrosspostError::configuration(
                "tasks",
                "timeout_seconds must be at least 1",
            ));
        }

        if self.backoff.multiplier < 1.0 {
            return Err(CrosspostError::configuration(
                "backoff",
                format!("multiplier {} must be >= 1.0", self.backoff.multiplier),
            ));
        }
        if self.backoff.base_delay_seconds > self.backoff.max_delay_seconds {
            return Err(CrosspostError::configuration(
                "backoff",
                "base_delay_seconds exceeds max_delay_seconds",
            ));
        }
        if !(0.0..1.0).contains(&self.backoff.max_jitter) {
            return Err(CrosspostError::configuration(
                "backoff",
                format!("max_jitter {} outside [0.0, 1.0)", self.backoff.max_jitter),
            ));
        }

        if self.crop.jpeg_quality == 0 || self.crop.jpeg_quality > 100 {
            return Err(CrosspostError::configuration(
                "crop",
                format!("jpeg_quality {} outside 1..=100", self.crop.jpeg_quality),
            ));
        }
        if !(0.0..=1.0).contains(&self.crop.saliency_confidence_threshold) {
            return Err(CrosspostError::configuration(
                "crop",
                "saliency_confidence_threshold outside 0.0..=1.0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrosspostConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queues.capacity, defaults::QUEUE_CAPACITY);
        assert_eq!(config.tasks.max_retry_attempts, defaults::MAX_RETRY_ATTEMPTS);
        assert_eq!(config.crop.jpeg_quality, defaults::JPEG_QUALITY);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = CrosspostConfig::default();
        config.queues.formatting_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CrosspostError::Configuration { .. }));
    }

    #[test]
    fn test_submultiplicative_backoff_rejected() {
        let mut config = CrosspostConfig::default();
        config.backoff.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_overrides_merge_with_defaults() {
        let toml = r#"
            [tasks]
            timeout_seconds = 45

            [crop]
            jpeg_quality = 80
        "#;
        let merged = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        let config: CrosspostConfig = merged.try_deserialize().unwrap();

        assert_eq!(config.tasks.timeout_seconds, 45);
        assert_eq!(config.crop.jpeg_quality, 80);
        // Untouched sections keep their defaults.
        assert_eq!(config.queues, QueueSettings::default());
        assert_eq!(
            config.tasks.max_retry_attempts,
            defaults::MAX_RETRY_ATTEMPTS
        );
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let toml = r#"
            [crop]
            jpeg_quality = 0
        "#;
        let merged = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        let config: CrosspostConfig = merged.try_deserialize().unwrap();
        assert!(config.validate().is_err());
    }
}
