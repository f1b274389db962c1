//! # Image Cropping
//!
//! ## Overview
//!
//! Adapts source images to per-platform target dimensions through an
//! ordered chain of strategies. Saliency-guided cropping runs first and
//! declines when the picture has no confident focal region, a gradient
//! heuristic takes over next, and plain center-crop plus pass-through
//! terminate the chain so every decodable image gets a result.
//!
//! [`CropEngine`] is the entry point: it resolves [`CropJob`]s against
//! the capability table, deduplicates identical jobs, caches completed
//! [`CropResult`]s, and persists adapted JPEGs through the configured
//! image repository.

pub mod analysis;
pub mod engine;
pub mod job;
pub mod strategies;

pub use engine::CropEngine;
pub use job::{CropJob, CropResult, CropStrategyKind};
pub use strategies::{
    default_chain, CenterCrop, CropStrategy, HeuristicRegionCrop, PassThrough,
    SaliencyGuidedCrop, StrategyOutcome,
};
