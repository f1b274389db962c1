//! # Crop Strategy Chain
//!
//! Four strategies in degrading order of sophistication: saliency-guided
//! crop, heuristic region crop, center crop, pass-through. Each either
//! succeeds with an adapted image, declines recoverably (the chain moves
//! on), or fails fatally (the chain aborts). Center crop and pass-through
//! always succeed, so a decodable image always comes out adapted.

use std::sync::Arc;

use image::{imageops::FilterType, DynamicImage};

use crate::capabilities::TargetDimensions;
use crate::constants::defaults;
use crate::cropping::analysis::{
    aspect_window, best_window, center_surround_map, gradient_energy_map, GrayMap,
};
use crate::cropping::job::CropStrategyKind;
use crate::error::CrosspostError;

/// Long-edge cap for the analysis copy; window placement happens on a
/// thumbnail and is mapped back to full resolution.
const ANALYSIS_EDGE: u32 = 512;
/// Blur radius for the center-surround contrast map.
const SALIENCY_BLUR_SIGMA: f32 = 6.0;
/// Mean per-pixel contrast below which an image counts as featureless.
const MIN_MEAN_CONTRAST: f64 = 1e-4;

/// Outcome of one strategy attempt.
pub enum StrategyOutcome {
    /// Adapted image, ready for re-encoding.
    Success(DynamicImage),
    /// This strategy cannot handle the image; try the next one.
    Recoverable { reason: String },
    /// Abort the whole chain.
    Fatal { error: CrosspostError },
}

impl std::fmt::Debug for StrategyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyOutcome::Success(image) => f
                .debug_struct("Success")
                .field("width", &image.width())
                .field("height", &image.height())
                .finish(),
            StrategyOutcome::Recoverable { reason } => f
                .debug_struct("Recoverable")
                .field("reason", reason)
                .finish(),
            StrategyOutcome::Fatal { error } => {
                f.debug_struct("Fatal").field("error", error).finish()
            }
        }
    }
}

/// One link of the adaptation chain.
pub trait CropStrategy: Send + Sync {
    fn kind(&self) -> CropStrategyKind;

    fn apply(&self, image: &DynamicImage, target: TargetDimensions) -> StrategyOutcome;
}

/// The standard chain in degrading order.
pub fn default_chain(confidence_threshold: f64) -> Vec<Arc<dyn CropStrategy>> {
    vec![
        Arc::new(SaliencyGuidedCrop::new(confidence_threshold)),
        Arc::new(HeuristicRegionCrop),
        Arc::new(CenterCrop),
        Arc::new(PassThrough),
    ]
}

/// Window at the target aspect ratio, placed in full-image coordinates.
struct PlacedWindow {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    energy_share: f64,
    mean_energy: f64,
}

fn analysis_image(image: &DynamicImage) -> DynamicImage {
    if image.width().max(image.height()) > ANALYSIS_EDGE {
        image.thumbnail(ANALYSIS_EDGE, ANALYSIS_EDGE)
    } else {
        image.clone()
    }
}

fn locate_window(image: &DynamicImage, target: TargetDimensions, map: &GrayMap) -> PlacedWindow {
    let (full_width, full_height) = (image.width(), image.height());
    let (win_width, win_height) = aspect_window(full_width, full_height, target);

    let scale_x = map.width as f64 / full_width as f64;
    let scale_y = map.height as f64 / full_height as f64;
    let thumb_win_w = ((win_width as f64 * scale_x).round() as u32).clamp(1, map.width);
    let thumb_win_h = ((win_height as f64 * scale_y).round() as u32).clamp(1, map.height);

    let best = best_window(map, thumb_win_w, thumb_win_h);
    let x = ((best.x as f64 / scale_x).round() as u32).min(full_width.saturating_sub(win_width));
    let y = ((best.y as f64 / scale_y).round() as u32).min(full_height.saturating_sub(win_height));

    PlacedWindow {
        x,
        y,
        width: win_width,
        height: win_height,
        energy_share: best.energy_share(),
        mean_energy: best.total_energy / (map.width as f64 * map.height as f64),
    }
}

fn crop_and_resize(image: &DynamicImage, window: &PlacedWindow, target: TargetDimensions) -> DynamicImage {
    image
        .crop_imm(window.x, window.y, window.width, window.height)
        .resize_exact(target.width, target.height, FilterType::Lanczos3)
}

/// Crops around the region of highest center-surround contrast. Declines
/// when the image is featureless or the best window captures too small a
/// share of the total contrast to trust the placement.
pub struct SaliencyGuidedCrop {
    confidence_threshold: f64,
}

impl SaliencyGuidedCrop {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }
}

impl Default for SaliencyGuidedCrop {
    fn default() -> Self {
        Self::new(defaults::SALIENCY_CONFIDENCE_THRESHOLD)
    }
}

impl CropStrategy for SaliencyGuidedCrop {
    fn kind(&self) -> CropStrategyKind {
        CropStrategyKind::SaliencyGuided
    }

    fn apply(&self, image: &DynamicImage, target: TargetDimensions) -> StrategyOutcome {
        let thumb = analysis_image(image);
        let map = center_surround_map(&thumb, SALIENCY_BLUR_SIGMA);
        let window = locate_window(image, target, &map);

        if window.mean_energy < MIN_MEAN_CONTRAST {
            return StrategyOutcome::Recoverable {
                reason: "image has no salient contrast".to_string(),
            };
        }
        if window.energy_share < self.confidence_threshold {
            return StrategyOutcome::Recoverable {
                reason: format!(
                    "saliency confidence {:.3} below threshold {:.3}",
                    window.energy_share, self.confidence_threshold
                ),
            };
        }

        StrategyOutcome::Success(crop_and_resize(image, &window, target))
    }
}

/// Crops around the region of highest gradient energy. Succeeds for any
/// decodable image; a flat image gets the centered window.
pub struct HeuristicRegionCrop;

impl CropStrategy for HeuristicRegionCrop {
    fn kind(&self) -> CropStrategyKind {
        CropStrategyKind::HeuristicRegion
    }

    fn apply(&self, image: &DynamicImage, target: TargetDimensions) -> StrategyOutcome {
        let thumb = analysis_image(image);
        let map = gradient_energy_map(&thumb);
        let window = locate_window(image, target, &map);
        StrategyOutcome::Success(crop_and_resize(image, &window, target))
    }
}

/// Symmetric crop to the target aspect ratio, then exact resize.
pub struct CenterCrop;

impl CropStrategy for CenterCrop {
    fn kind(&self) -> CropStrategyKind {
        CropStrategyKind::CenterCrop
    }

    fn apply(&self, image: &DynamicImage, target: TargetDimensions) -> StrategyOutcome {
        StrategyOutcome::Success(image.resize_to_fill(
            target.width,
            target.height,
            FilterType::Lanczos3,
        ))
    }
}

/// Returns the image unchanged. Terminal link of the chain.
pub struct PassThrough;

impl CropStrategy for PassThrough {
    fn kind(&self) -> CropStrategyKind {
        CropStrategyKind::PassThrough
    }

    fn apply(&self, image: &DynamicImage, _target: TargetDimensions) -> StrategyOutcome {
        StrategyOutcome::Success(image.clone())
    }
}
