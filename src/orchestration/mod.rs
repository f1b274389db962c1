//! # Workflow Orchestration
//!
//! Coordination layer between the public API and the queue workers.
//!
//! ## Core Components
//!
//! - **WorkflowOrchestrator**: Validates requests, fans them out into one
//!   platform task per configuration, and enqueues the first stage
//! - **WorkflowStore**: In-memory workflow state with a task-to-workflow
//!   index and aggregate status maintenance
//! - **PublicationTaskHandler / CropTaskHandler**: Stage execution behind
//!   the queue workers, including per-task retry and failure handling
//! - **BackoffCalculator**: Retry delay policy, exponential with jitter or
//!   server-requested
//!
//! Tasks move through the stages generation, formatting, optional image
//! adaptation, and publishing. Each stage runs on its own queue and hands
//! the task to the next one; failure handling decides between a delayed
//! retry on the same queue and a terminal task failure.

pub mod backoff;
pub mod handlers;
pub mod orchestrator;
pub mod store;
pub mod types;

pub use backoff::{parse_retry_after, BackoffCalculator, BackoffResult, BackoffType};
pub use handlers::{CropTaskHandler, PublicationTaskHandler, StageContext};
pub use orchestrator::WorkflowOrchestrator;
pub use store::WorkflowStore;
pub use types::{
    stage_message, TaskPayload, TaskSnapshot, WorkflowMetrics, WorkflowSnapshot,
};
