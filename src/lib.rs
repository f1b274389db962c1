#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Crosspost Core
//!
//! Multi-platform social publication engine: one request fans out into
//! independent per-platform tasks that move through content generation,
//! formatting, image adaptation, and publishing queues, with a uniform
//! draft abstraction for platforms with and without native staging and an
//! image crop engine that degrades through a chain of vision strategies.
//!
//! ## Overview
//!
//! A publication request names a source site, a text, and a set of target
//! platforms. The orchestrator validates it, creates one [`Workflow`] with
//! one `PlatformTask` per platform configuration, and drives each task
//! across dedicated in-process queues. Platform failures stay isolated:
//! one task failing leaves its siblings untouched and the workflow
//! aggregate reports the partial outcome.
//!
//! ## Module Organization
//!
//! - [`api`] - Transport-agnostic service facade, one method per operation
//! - [`orchestration`] - Workflow fan-out, stage handlers, retry/backoff
//! - [`messaging`] - Named in-process queues and worker pools
//! - [`cropping`] - Strategy-chain image adaptation with caching
//! - [`drafts`] - State-machine-governed draft store with content analysis
//! - [`adapters`] + [`registry`] - External platform seams
//! - [`capabilities`] - Closed platform/content-type model and limits
//! - [`models`] - Requests, workflows, tasks, drafts
//! - [`credentials`] - Per `(site, platform)` credential registry
//! - [`state_machine`] - Task, workflow, and draft state transitions
//! - [`config`] - Layered, validated runtime configuration
//! - [`events`] - Broadcast event stream for observers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crosspost_core::api::CrosspostService;
//! use crosspost_core::config::CrosspostConfig;
//! use crosspost_core::models::PublishRequest;
//! use crosspost_core::capabilities::{Platform, SiteWeb};
//! # use crosspost_core::adapters::ImageRepository;
//!
//! # async fn example(repository: Arc<dyn ImageRepository>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrosspostConfig::load()?;
//! let service = CrosspostService::new(config, repository);
//! // register publisher/formatter adapters on service.registry() here
//! service.start()?;
//!
//! let accepted = service
//!     .publish(PublishRequest {
//!         texte_source: "Nouvel article en ligne".to_string(),
//!         site_web: SiteWeb::Stuffgaming,
//!         plateformes: vec![Platform::Twitter, Platform::Facebook],
//!         hashtags: None,
//!         mentions: None,
//!         lien_source: None,
//!     })
//!     .await?;
//! println!("tracking id: {}", accepted.request_id);
//! # Ok(())
//! # }
//! ```
//!
//! [`Workflow`]: models::Workflow

pub mod adapters;
pub mod api;
pub mod capabilities;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod cropping;
pub mod drafts;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;

pub use api::CrosspostService;
pub use capabilities::{CapabilityTable, ContentType, Platform, SiteWeb};
pub use config::CrosspostConfig;
pub use error::{CrosspostError, Result};
pub use models::{EnhancedPublishRequest, PlatformConfig, PublishRequest};
pub use orchestration::WorkflowOrchestrator;
