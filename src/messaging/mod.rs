//! # Messaging Module
//!
//! In-process task queues for the publication pipeline. A fixed set of
//! named, bounded queues delivers stage messages to per-queue worker
//! pools; execution status for standalone submissions is tracked here too.

pub mod errors;
pub mod message;
pub mod queue;
pub mod status;
pub mod worker;

pub use errors::{QueueError, QueueResult};
pub use message::{MessageMetadata, TaskCategory, TaskMessage};
pub use queue::{QueueClient, QueueReceiver, QueueStats};
pub use status::{ExecutionStatus, ExecutionStatusStore};
pub use worker::{TaskHandler, WorkerPool};
