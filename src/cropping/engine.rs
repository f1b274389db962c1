//! # Crop Engine
//!
//! ## Overview
//!
//! Executes [`CropJob`]s through the strategy chain with caching and
//! deduplication. Identical jobs share one computation: the first caller
//! runs it, concurrent callers await the same in-flight result, and later
//! callers get the cached value until an explicit refresh. Decode and
//! pixel work runs on the blocking thread pool; source bytes come from
//! the injected [`ImageRepository`] and adapted results are re-encoded as
//! JPEG and stored back through it.
//!
//! Only a source decode failure is fatal. A strategy that cannot handle
//! an image declines recoverably and the chain moves on, so the terminal
//! center-crop / pass-through links make adaptation total for decodable
//! sources.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::try_join_all;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::ImageRepository;
use crate::capabilities::TargetDimensions;
use crate::constants::defaults;
use crate::cropping::job::{CropJob, CropResult, CropStrategyKind};
use crate::cropping::strategies::{default_chain, CropStrategy, StrategyOutcome};
use crate::error::{CrosspostError, Result};
use crate::events::{EventPublisher, PublicationEvent};

/// Strategy-chain crop executor with per-key caching and singleflight.
pub struct CropEngine {
    repository: Arc<dyn ImageRepository>,
    events: EventPublisher,
    strategies: Vec<Arc<dyn CropStrategy>>,
    jpeg_quality: u8,
    cache: DashMap<String, Arc<OnceCell<CropResult>>>,
}

impl CropEngine {
    /// Engine with the standard strategy chain and default JPEG quality.
    pub fn new(repository: Arc<dyn ImageRepository>, events: EventPublisher) -> Self {
        Self::with_strategies(
            repository,
            events,
            default_chain(defaults::SALIENCY_CONFIDENCE_THRESHOLD),
            defaults::JPEG_QUALITY,
        )
    }

    pub fn with_strategies(
        repository: Arc<dyn ImageRepository>,
        events: EventPublisher,
        strategies: Vec<Arc<dyn CropStrategy>>,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            repository,
            events,
            strategies,
            jpeg_quality,
            cache: DashMap::new(),
        }
    }

    /// Adapt one image, deduplicating against identical in-flight jobs
    /// and returning the cached result when one exists.
    pub async fn adapt(&self, job: &CropJob) -> Result<CropResult> {
        let cache_key = job.cache_key();
        let cell = self
            .cache
            .entry(cache_key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell.get_or_try_init(|| self.compute(job, &cache_key)).await?;
        Ok(result.clone())
    }

    /// Adapt a batch, one job per carousel slide. Any fatal job fails the
    /// whole batch.
    pub async fn adapt_all(&self, jobs: &[CropJob]) -> Result<Vec<CropResult>> {
        try_join_all(jobs.iter().map(|job| self.adapt(job))).await
    }

    /// Drop the cached result and recompute.
    pub async fn refresh(&self, job: &CropJob) -> Result<CropResult> {
        self.invalidate(&job.cache_key());
        self.adapt(job).await
    }

    /// Remove one cached result; returns whether anything was cached.
    pub fn invalidate(&self, cache_key: &str) -> bool {
        self.cache.remove(cache_key).is_some()
    }

    /// Completed result for a key, if cached.
    pub fn cached(&self, cache_key: &str) -> Option<CropResult> {
        self.cache
            .get(cache_key)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    async fn compute(&self, job: &CropJob, cache_key: &str) -> Result<CropResult> {
        match self.compute_inner(job, cache_key).await {
            Ok(result) => {
                info!(
                    cache_key,
                    strategy = result.strategy.as_str(),
                    width = result.width,
                    height = result.height,
                    "✅ Image adapted"
                );
                self.events.publish(PublicationEvent::CropCompleted {
                    cache_key: cache_key.to_string(),
                    strategy: result.strategy.as_str().to_string(),
                });
                Ok(result)
            }
            Err(error) => {
                self.events.publish(PublicationEvent::CropFailed {
                    cache_key: cache_key.to_string(),
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn compute_inner(&self, job: &CropJob, cache_key: &str) -> Result<CropResult> {
        debug!(cache_key, source = %job.source, "Fetching source image");
        let bytes = self.repository.fetch(&job.source).await?;

        let strategies = self.strategies.clone();
        let quality = self.jpeg_quality;
        let source = job.source.clone();
        let target = job.target;
        let (encoded, strategy, width, height) =
            tokio::task::spawn_blocking(move || {
                adapt_blocking(&bytes, &source, target, &strategies, quality)
            })
            .await
            .map_err(|err| CrosspostError::internal(format!("Crop worker panicked: {err}")))??;

        // Deterministic storage key per cache key, so a recompute of the
        // same job overwrites rather than accumulates.
        let storage_key = format!(
            "adapted/{}.jpg",
            Uuid::new_v5(&Uuid::NAMESPACE_URL, cache_key.as_bytes())
        );
        let result_reference = self
            .repository
            .store(&storage_key, encoded, "image/jpeg")
            .await?;

        Ok(CropResult {
            cache_key: cache_key.to_string(),
            result_reference,
            strategy,
            width,
            height,
            completed_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for CropEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropEngine")
            .field("strategies", &self.strategies.len())
            .field("jpeg_quality", &self.jpeg_quality)
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn adapt_blocking(
    bytes: &[u8],
    source: &str,
    target: TargetDimensions,
    strategies: &[Arc<dyn CropStrategy>],
    quality: u8,
) -> Result<(Vec<u8>, CropStrategyKind, u32, u32)> {
    let image = image::load_from_memory(bytes)
        .map_err(|err| CrosspostError::image_decode(source, err.to_string()))?;

    let (adapted, strategy) = run_chain(strategies, &image, target)?;
    let (width, height) = (adapted.width(), adapted.height());
    let encoded = encode_jpeg(&adapted, quality)?;
    Ok((encoded, strategy, width, height))
}

fn run_chain(
    strategies: &[Arc<dyn CropStrategy>],
    image: &DynamicImage,
    target: TargetDimensions,
) -> Result<(DynamicImage, CropStrategyKind)> {
    for strategy in strategies {
        match strategy.apply(image, target) {
            StrategyOutcome::Success(adapted) => return Ok((adapted, strategy.kind())),
            StrategyOutcome::Recoverable { reason } => {
                warn!(
                    strategy = strategy.kind().as_str(),
                    reason, "Strategy declined, trying next"
                );
            }
            StrategyOutcome::Fatal { error } => return Err(error),
        }
    }
    Err(CrosspostError::strategy(
        "chain",
        "no strategy produced an adapted image",
    ))
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|err| CrosspostError::internal(format!("JPEG encoding failed: {err}")))?;
    Ok(buffer)
}
