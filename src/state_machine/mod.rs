// State definitions for workflows, platform tasks, drafts, and crop jobs.
//
// Status strings on the wire are the snake_case renderings of these enums;
// aggregation and transition rules are enforced by the owning stores, which
// rely on the terminal/error predicates defined here.

pub mod states;

// Re-export main types for convenient access
pub use states::{CropState, DraftState, TaskState, WorkflowState};
