//! # Data Model
//!
//! Core entities of the publication system: requests, workflows, platform
//! tasks, and drafts. Crop job records live in [`crate::cropping`] next to
//! the engine that produces them.

pub mod draft;
pub mod request;
pub mod task;
pub mod workflow;

// Re-export core models for easy access
pub use draft::{ContentAnalysis, Draft, DraftContent};
pub use request::{EnhancedPublishRequest, PlatformConfig, PublishRequest};
pub use task::PlatformTask;
pub use workflow::Workflow;
