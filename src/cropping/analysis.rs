//! Pixel analysis for crop window selection.
//!
//! Works on single-channel float maps: a center-surround contrast map for
//! saliency-guided cropping, a gradient-magnitude map for the heuristic
//! region crop, and an integral-image sliding-window search shared by
//! both. All functions are pure and deterministic.

use image::{imageops, DynamicImage};

use crate::capabilities::TargetDimensions;

/// Single-channel float map over an image.
#[derive(Debug, Clone)]
pub struct GrayMap {
    pub width: u32,
    pub height: u32,
    data: Vec<f32>,
}

impl GrayMap {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }
}

/// Highest-energy window found by [`best_window`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub energy: f64,
    pub total_energy: f64,
}

impl BestWindow {
    /// Fraction of the map's total energy inside the window.
    pub fn energy_share(&self) -> f64 {
        if self.total_energy <= f64::EPSILON {
            0.0
        } else {
            self.energy / self.total_energy
        }
    }
}

/// Center-surround contrast: per-pixel distance between the luma image
/// and its Gaussian blur. Bright-on-dark or dark-on-bright regions score
/// high; flat regions score near zero.
pub fn center_surround_map(image: &DynamicImage, sigma: f32) -> GrayMap {
    let luma = image.to_luma32f();
    let (width, height) = luma.dimensions();
    let blurred = imageops::blur(&luma, sigma);

    let data = luma
        .as_raw()
        .iter()
        .zip(blurred.as_raw().iter())
        .map(|(center, surround)| (center - surround).abs())
        .collect();

    GrayMap::new(width, height, data)
}

/// Gradient magnitude from forward differences; edges and texture score
/// high, flat regions score zero.
pub fn gradient_energy_map(image: &DynamicImage) -> GrayMap {
    let luma = image.to_luma32f();
    let (width, height) = luma.dimensions();
    let raw = luma.as_raw();
    let w = width as usize;
    let h = height as usize;

    let mut data = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let here = raw[y * w + x];
            let right = if x + 1 < w { raw[y * w + x + 1] } else { here };
            let below = if y + 1 < h { raw[(y + 1) * w + x] } else { here };
            data[y * w + x] = (right - here).abs() + (below - here).abs();
        }
    }

    GrayMap::new(width, height, data)
}

/// Largest window with the target's aspect ratio that fits the image.
pub fn aspect_window(width: u32, height: u32, target: TargetDimensions) -> (u32, u32) {
    let target_ratio = target.aspect_ratio();
    let image_ratio = width as f64 / height as f64;

    if image_ratio > target_ratio {
        let win_width = ((height as f64) * target_ratio)
            .round()
            .clamp(1.0, width as f64) as u32;
        (win_width, height)
    } else {
        let win_height = ((width as f64) / target_ratio)
            .round()
            .clamp(1.0, height as f64) as u32;
        (width, win_height)
    }
}

/// Exhaustive sliding-window search for the highest-energy placement,
/// using an integral image for O(1) window sums. A map with no energy
/// yields the centered window.
pub fn best_window(map: &GrayMap, win_width: u32, win_height: u32) -> BestWindow {
    let w = map.width as usize;
    let h = map.height as usize;
    let ww = (win_width.min(map.width).max(1)) as usize;
    let wh = (win_height.min(map.height).max(1)) as usize;

    let stride = w + 1;
    let mut integral = vec![0.0f64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0.0f64;
        for x in 0..w {
            row_sum += map.at(x as u32, y as u32) as f64;
            integral[(y + 1) * stride + (x + 1)] = integral[y * stride + (x + 1)] + row_sum;
        }
    }
    let total_energy = integral[h * stride + w];

    if total_energy <= f64::EPSILON {
        return BestWindow {
            x: ((w - ww) / 2) as u32,
            y: ((h - wh) / 2) as u32,
            width: ww as u32,
            height: wh as u32,
            energy: 0.0,
            total_energy,
        };
    }

    let rect_sum = |x: usize, y: usize| -> f64 {
        integral[(y + wh) * stride + (x + ww)] - integral[y * stride + (x + ww)]
            - integral[(y + wh) * stride + x]
            + integral[y * stride + x]
    };

    let mut best_x = 0usize;
    let mut best_y = 0usize;
    let mut best_energy = -1.0f64;
    for y in 0..=(h - wh) {
        for x in 0..=(w - ww) {
            let energy = rect_sum(x, y);
            if energy > best_energy {
                best_energy = energy;
                best_x = x;
                best_y = y;
            }
        }
    }

    BestWindow {
        x: best_x as u32,
        y: best_y as u32,
        width: ww as u32,
        height: wh as u32,
        energy: best_energy,
        total_energy,
    }
}
