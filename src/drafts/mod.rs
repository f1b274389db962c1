//! # Draft Staging
//!
//! ## Overview
//!
//! Uniform draft abstraction across platforms with and without native
//! staging APIs. Platforms that cannot hold server-side drafts get a
//! locally staged "simulated" draft; the state machine and the quality
//! analysis are identical either way, so callers never branch on
//! platform capabilities when working with drafts.

pub mod analysis;
pub mod store;

pub use analysis::analyze_content;
pub use store::{DraftStore, NewDraft};
