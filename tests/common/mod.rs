//! Shared fixtures for the integration suite: an in-memory image
//! repository, scripted platform adapters, and a fully wired service
//! builder.

#![allow(dead_code)] // Each test binary uses its own subset of these fixtures

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use parking_lot::Mutex;
use tempfile::TempDir;

use crosspost_core::adapters::{
    ContentGenerator, FormatRequest, FormattedContent, FormatterAdapter, ImageRepository,
    PublishContent, PublishOutcome, PublisherAdapter,
};
use crosspost_core::api::CrosspostService;
use crosspost_core::capabilities::{Platform, SiteWeb};
use crosspost_core::config::CrosspostConfig;
use crosspost_core::credentials::{required_fields, CredentialStore, PlatformCredentials};
use crosspost_core::error::{CrosspostError, Result};

/// Object store backed by a map, counting writes so dedup is observable.
#[derive(Default)]
pub struct MemoryRepository {
    pub objects: DashMap<String, Vec<u8>>,
    pub store_calls: AtomicUsize,
}

impl MemoryRepository {
    pub fn with_object(self, key: &str, bytes: Vec<u8>) -> Self {
        self.objects.insert(key.to_string(), bytes);
        self
    }
}

#[async_trait]
impl ImageRepository for MemoryRepository {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.objects
            .get(reference)
            .map(|entry| entry.clone())
            .ok_or_else(|| CrosspostError::internal(format!("missing object: {reference}")))
    }

    async fn store(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.insert(key.to_string(), bytes);
        Ok(key.to_string())
    }
}

/// Object store rooted in a temporary directory. Keys flatten to single
/// file names, so `path_for` resolves any stored reference.
pub struct FsRepository {
    root: TempDir,
}

impl FsRepository {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.path().join(key.replace('/', "_"))
    }

    pub fn seed(self, key: &str, bytes: &[u8]) -> Self {
        std::fs::write(self.path_for(key), bytes).expect("seed image");
        self
    }
}

#[async_trait]
impl ImageRepository for FsRepository {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.path_for(reference))
            .await
            .map_err(|e| CrosspostError::internal(format!("read {reference}: {e}")))
    }

    async fn store(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        tokio::fs::write(self.path_for(key), bytes)
            .await
            .map_err(|e| CrosspostError::internal(format!("write {key}: {e}")))?;
        Ok(key.to_string())
    }
}

/// Publisher that fails its first `fail_first` calls with a retryable
/// rate-limit error, then succeeds. Records every call.
pub struct ScriptedPublisher {
    platform: Platform,
    fail_first: usize,
    pub calls: AtomicUsize,
    pub tokens: Mutex<Vec<Option<String>>>,
    pub texts: Mutex<Vec<String>>,
    pub images: Mutex<Vec<Vec<String>>>,
    pub staged_natively: AtomicUsize,
}

impl ScriptedPublisher {
    pub fn succeeding(platform: Platform) -> Self {
        Self::failing_first(platform, 0)
    }

    pub fn failing_first(platform: Platform, fail_first: usize) -> Self {
        Self {
            platform,
            fail_first,
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            staged_natively: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PublisherAdapter for ScriptedPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(
        &self,
        content: &PublishContent,
        _credentials: &PlatformCredentials,
        idempotency_token: Option<&str>,
    ) -> Result<PublishOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .push(idempotency_token.map(str::to_string));
        self.texts.lock().push(content.text.clone());
        self.images.lock().push(content.images.clone());
        if call < self.fail_first {
            return Err(CrosspostError::platform_api(
                self.platform.as_str(),
                "rate limited",
                true,
                Some(0),
            ));
        }
        Ok(PublishOutcome::new(
            format!("{}-post-{call}", self.platform),
            Some(format!("https://{}.example/posts/{call}", self.platform)),
        ))
    }

    async fn stage_draft(
        &self,
        _content: &PublishContent,
        _credentials: &PlatformCredentials,
    ) -> Result<String> {
        let n = self.staged_natively.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-draft-{n}", self.platform))
    }
}

/// Publisher that always fails with a non-retryable authentication error.
pub struct RejectingPublisher {
    platform: Platform,
}

impl RejectingPublisher {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PublisherAdapter for RejectingPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(
        &self,
        _content: &PublishContent,
        _credentials: &PlatformCredentials,
        _idempotency_token: Option<&str>,
    ) -> Result<PublishOutcome> {
        Err(CrosspostError::platform_api(
            self.platform.as_str(),
            "token expired",
            false,
            None,
        ))
    }
}

/// Generator that prefixes the source text, making generated output
/// distinguishable from the fallback.
pub struct PrefixGenerator;

#[async_trait]
impl ContentGenerator for PrefixGenerator {
    async fn generate(&self, site: SiteWeb, source_text: &str) -> Result<String> {
        Ok(format!("[{site}] {source_text}"))
    }
}

/// Formatter that fails its first `fail_first` calls with a retryable
/// error, then formats like the fallback would.
pub struct FlakyFormatter {
    platform: Platform,
    fail_first: usize,
    pub calls: AtomicUsize,
}

impl FlakyFormatter {
    pub fn new(platform: Platform, fail_first: usize) -> Self {
        Self {
            platform,
            fail_first,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FormatterAdapter for FlakyFormatter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn format(&self, request: &FormatRequest) -> Result<FormattedContent> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(CrosspostError::platform_api(
                self.platform.as_str(),
                "formatting service unavailable",
                true,
                None,
            ));
        }
        Ok(FormattedContent {
            platform: self.platform,
            character_count: request.base_content.chars().count(),
            text: request.base_content.clone(),
            hashtags: request.hashtags.clone(),
            mentions: request.mentions.clone(),
            lien_source: request.lien_source.clone(),
        })
    }
}

/// Formatter that uppercases, proving adapter output wins over the
/// capability fallback.
pub struct UppercaseFormatter {
    platform: Platform,
}

impl UppercaseFormatter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl FormatterAdapter for UppercaseFormatter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn format(&self, request: &FormatRequest) -> Result<FormattedContent> {
        let text = request.base_content.to_uppercase();
        Ok(FormattedContent {
            platform: self.platform,
            character_count: text.chars().count(),
            text,
            hashtags: request.hashtags.clone(),
            mentions: request.mentions.clone(),
            lien_source: request.lien_source.clone(),
        })
    }
}

/// Synthetic JPEG with a smooth gradient, decodable by the crop chain.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));
    let mut buffer = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, 90))
        .expect("jpeg encode");
    buffer
}

/// Complete credential set for one pair, every required field present.
pub fn credentials_for(site: SiteWeb, platform: Platform) -> PlatformCredentials {
    let values: HashMap<String, String> = required_fields(platform)
        .iter()
        .map(|&field| (field.to_string(), format!("secret-{field}")))
        .collect();
    PlatformCredentials::new(site, platform, values)
}

/// Service with default config, an empty credential store, and the given
/// repository. Workers are not started.
pub fn service(repository: Arc<dyn ImageRepository>) -> CrosspostService {
    service_with(CrosspostConfig::default(), repository)
}

/// Service with an explicit config; tests needing deterministic backoff
/// disable jitter here.
pub fn service_with(
    config: CrosspostConfig,
    repository: Arc<dyn ImageRepository>,
) -> CrosspostService {
    CrosspostService::with_credentials(config, repository, CredentialStore::new())
}

/// Poll until `condition` holds or the deadline passes.
pub async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    tokio::time::timeout(deadline, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
