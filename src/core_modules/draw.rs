//! Minimal raster drawing for debug overlays.

use image::{GrayImage, Rgb, RgbImage};

pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Expands a single-channel mask into an RGB canvas.
pub fn mask_to_rgb(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

pub fn vertical_line(canvas: &mut RgbImage, x: i64, colour: Rgb<u8>) {
    if x < 0 || x >= canvas.width() as i64 {
        return;
    }
    for y in 0..canvas.height() {
        canvas.put_pixel(x as u32, y, colour);
    }
}

pub fn filled_circle(canvas: &mut RgbImage, (cx, cy): (i64, i64), radius: i64, colour: Rgb<u8>) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    for y in (cy - radius).max(0)..=(cy + radius).min(height - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(width - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                canvas.put_pixel(x as u32, y as u32, colour);
            }
        }
    }
}
