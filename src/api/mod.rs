//! # Service Facade
//!
//! Public operation surface of the crate. [`CrosspostService`] wires the
//! stores, queues, and worker pools together and exposes one method per
//! operation; the DTOs in [`types`] are the wire shapes those methods
//! accept and return.

pub mod service;
pub mod types;

pub use service::CrosspostService;
pub use types::{
    AcceptedResponse, CropSubmission, HealthStatus, QueueStatus, QueueWorkerStatus,
    UnifiedCropRequest, WorkflowStatusView,
};
