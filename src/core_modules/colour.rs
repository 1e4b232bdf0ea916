// THEORY:
// Colour-space reduction turns the RGB region of interest into something a single
// threshold can split: a luma plane for grayscale, or a hue/saturation/value
// triple for HSV. Both conversions follow the 8-bit conventions used by most
// vision toolkits, so thresholds tuned elsewhere carry over: luma uses the
// Rec. 601 weights in 14-bit fixed point, and hue is stored as degrees / 2 so that
// it fits a byte (0..180).
//
// Binarisation always works on one plane. `ColourReduced::plane` picks it: the
// luma plane itself, or the value channel of HSV.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::core_modules::debug_buffer::{ColourHint, DebugImage};

/// The colour space the lane tracker reduces its ROI to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColourType {
    Grey,
    Hsv,
}

impl ColourType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColourType::Grey => "grey",
            ColourType::Hsv => "hsv",
        }
    }
}

impl std::str::FromStr for ColourType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grey" | "gray" => Ok(ColourType::Grey),
            "hsv" => Ok(ColourType::Hsv),
            _ => Err(()),
        }
    }
}

/// A ROI after colour-space reduction.
#[derive(Debug, Clone)]
pub enum ColourReduced {
    Grey(GrayImage),
    Hsv(RgbImage),
}

impl ColourReduced {
    pub fn reduce(roi: &RgbImage, colour_type: ColourType) -> Self {
        match colour_type {
            ColourType::Grey => ColourReduced::Grey(to_grey(roi)),
            ColourType::Hsv => ColourReduced::Hsv(to_hsv(roi)),
        }
    }

    /// The single plane binarisation operates on.
    pub fn plane(&self) -> GrayImage {
        match self {
            ColourReduced::Grey(grey) => grey.clone(),
            ColourReduced::Hsv(hsv) => GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| Luma([hsv.get_pixel(x, y).0[2]])),
        }
    }

    pub fn to_debug(&self) -> (DebugImage, ColourHint) {
        match self {
            ColourReduced::Grey(grey) => (DebugImage::Gray(grey.clone()), ColourHint::Gray),
            ColourReduced::Hsv(hsv) => (DebugImage::Rgb(hsv.clone()), ColourHint::Hsv),
        }
    }
}

pub fn to_grey(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Luma([luma(r, g, b)])
    })
}

/// Rec. 601 luma in 14-bit fixed point.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868;
    ((weighted + (1 << 13)) >> 14) as u8
}

pub fn to_hsv(image: &RgbImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgb(rgb_to_hsv(r, g, b))
    })
}

/// 8-bit HSV: hue in 0..180, saturation and value in 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let saturation = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    [
        ((hue / 2.0).round() as u32 % 180) as u8,
        saturation.round() as u8,
        max as u8,
    ]
}

/// Inverse of `rgb_to_hsv`, for viewing HSV buffers.
pub fn hsv_to_rgb(h: u8, s: u8, v: u8) -> [u8; 3] {
    let value = v as f64;
    let saturation = s as f64 / 255.0;
    let chroma = value * saturation;
    let sector = (h as f64 * 2.0) / 60.0;
    let secondary = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let base = value - chroma;

    let (r, g, b) = match sector as u32 {
        0 => (chroma, secondary, 0.0),
        1 => (secondary, chroma, 0.0),
        2 => (0.0, chroma, secondary),
        3 => (0.0, secondary, chroma),
        4 => (secondary, 0.0, chroma),
        _ => (chroma, 0.0, secondary),
    };
    [
        (r + base).round().clamp(0.0, 255.0) as u8,
        (g + base).round().clamp(0.0, 255.0) as u8,
        (b + base).round().clamp(0.0, 255.0) as u8,
    ]
}
