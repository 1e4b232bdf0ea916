// THEORY:
// Binarisation splits a single plane into foreground (255) and background (0).
// Either a fixed cutoff is used, or Otsu's method picks the cutoff that maximises
// the between-class variance of the plane's histogram, which adapts to lighting
// changes between runs. A pixel is set when it is strictly above the cutoff.

use image::{GrayImage, Luma};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// How the binarisation cutoff is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    Otsu,
    Fixed(u8),
}

/// Binarises `plane`, returning the mask and the cutoff that was applied.
pub fn binarize(plane: &GrayImage, mode: ThresholdMode) -> (GrayImage, u8) {
    let level = match mode {
        ThresholdMode::Otsu => otsu_level(plane),
        ThresholdMode::Fixed(level) => level,
    };
    let mask = GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
        if plane.get_pixel(x, y).0[0] > level {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });
    (mask, level)
}

/// Otsu's threshold over the 256-bin histogram of `plane`.
pub fn otsu_level(plane: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in plane.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total = (plane.width() as u64 * plane.height() as u64) as f64;
    if total == 0.0 {
        return 0;
    }

    let mean: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64 / total)
        .sum();

    const EPSILON: f64 = f64::EPSILON;
    let mut weight_low = 0.0;
    let mut mean_low = 0.0;
    let mut best_variance = 0.0;
    let mut best_level = 0u8;

    for (i, &count) in histogram.iter().enumerate() {
        let p = count as f64 / total;
        mean_low *= weight_low;
        weight_low += p;
        let weight_high = 1.0 - weight_low;

        if weight_low.min(weight_high) < EPSILON || weight_low.max(weight_high) > 1.0 - EPSILON {
            continue;
        }

        mean_low = (mean_low + i as f64 * p) / weight_low;
        let mean_high = (mean - weight_low * mean_low) / weight_high;
        let variance = weight_low * weight_high * (mean_low - mean_high).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_level = i as u8;
        }
    }
    best_level
}

/// Swaps foreground and background.
pub fn invert(mask: &mut GrayImage) {
    for pixel in mask.pixels_mut() {
        pixel.0[0] = u8::MAX - pixel.0[0];
    }
}
