//! # System Constants
//!
//! Queue names, retry/timeout defaults, and lifecycle event names that define
//! the operational boundaries of the publication system.

/// Named work queues served by independently sized worker pools.
pub mod queues {
    /// Base-content generation (one message per workflow).
    pub const CONTENT_GENERATION: &str = "content_generation";
    /// Per-platform content formatting.
    pub const CONTENT_FORMATTING: &str = "content_formatting";
    /// Per-platform publication through the platform adapters.
    pub const CONTENT_PUBLISHING: &str = "content_publishing";
    /// Image cropping/resizing toward platform dimensions.
    pub const IMAGE_ADAPTATION: &str = "image_adaptation";

    /// All queue names, in pipeline order.
    pub const ALL_QUEUES: &[&str] = &[
        CONTENT_GENERATION,
        CONTENT_FORMATTING,
        CONTENT_PUBLISHING,
        IMAGE_ADAPTATION,
    ];
}

/// Lifecycle event names published on the event bus.
pub mod events {
    // Workflow lifecycle
    pub const WORKFLOW_CREATED: &str = "workflow.created";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_CANCELLED: &str = "workflow.cancelled";

    // Platform task lifecycle
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_RETRY_SCHEDULED: &str = "task.retry_scheduled";

    // Draft lifecycle
    pub const DRAFT_CREATED: &str = "draft.created";
    pub const DRAFT_PUBLISHED: &str = "draft.published";
    pub const DRAFT_DELETED: &str = "draft.deleted";

    // Image adaptation lifecycle
    pub const CROP_COMPLETED: &str = "crop.completed";
    pub const CROP_FAILED: &str = "crop.failed";
}

/// Default tuning values; all overridable through configuration.
pub mod defaults {
    /// Retry ceiling for idempotent (generation/formatting/cropping) tasks.
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;

    /// Extra attempts granted to publish tasks beyond the first.
    /// Kept at one to bound duplicate-post risk.
    pub const PUBLISH_EXTRA_RETRIES: u32 = 1;

    /// Per-task execution timeout.
    pub const TASK_TIMEOUT_SECONDS: u64 = 300;

    /// Exponential backoff base delay.
    pub const BACKOFF_BASE_DELAY_SECONDS: u64 = 1;

    /// Exponential backoff ceiling.
    pub const BACKOFF_MAX_DELAY_SECONDS: u64 = 300;

    /// Exponential backoff multiplier.
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Maximum jitter as a fraction of the computed delay.
    pub const BACKOFF_MAX_JITTER: f64 = 0.1;

    /// Worker pool sizes per queue.
    pub const CONTENT_GENERATION_WORKERS: usize = 2;
    pub const CONTENT_FORMATTING_WORKERS: usize = 4;
    pub const CONTENT_PUBLISHING_WORKERS: usize = 2;
    pub const IMAGE_ADAPTATION_WORKERS: usize = 2;

    /// Bounded queue capacity before submit applies backpressure.
    pub const QUEUE_CAPACITY: usize = 256;

    /// JPEG quality for re-encoded crop results.
    pub const JPEG_QUALITY: u8 = 90;

    /// Minimum share of total saliency energy the best window must hold
    /// before the saliency strategy trusts its own answer.
    pub const SALIENCY_CONFIDENCE_THRESHOLD: f64 = 0.25;
}

/// System-wide constants.
pub mod system {
    /// Unknown value placeholder.
    pub const UNKNOWN: &str = "unknown";

    /// Version compatibility marker.
    pub const CROSSPOST_CORE_VERSION: &str = "0.1.0";

    /// Instagram caps carousels at ten slides.
    pub const MAX_CAROUSEL_SLIDES: u32 = 10;

    /// Upper bound on platform configs in one request.
    pub const MAX_PLATFORM_CONFIGS: usize = 16;
}
