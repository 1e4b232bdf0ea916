// THEORY:
// Image moments summarise a binary mask with three sums: the zeroth moment (total
// intensity), and the first moments along x and y (intensity-weighted
// coordinates). Dividing a first moment by the zeroth gives the centroid of the
// foreground. The lane tracker only needs the horizontal centroid, but keeps the
// vertical one for diagnostics.
//
// `CentroidTracker` adds the one piece of memory the tracker needs: the last
// trustworthy centroid. When the mask has too little foreground (or none at all,
// where the division would be undefined) the last known position is reused, and
// before anything was ever seen the frame centre stands in for it.

use image::GrayImage;

use crate::core_modules::threshold::FOREGROUND;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    pub fn of(mask: &GrayImage) -> Self {
        let mut moments = Moments::default();
        for (x, y, pixel) in mask.enumerate_pixels() {
            let intensity = pixel.0[0] as f64;
            if intensity == 0.0 {
                continue;
            }
            moments.m00 += intensity;
            moments.m10 += x as f64 * intensity;
            moments.m01 += y as f64 * intensity;
        }
        moments
    }

    /// Foreground area in pixels, for a mask whose foreground is 255.
    pub fn area(&self) -> f64 {
        self.m00 / FOREGROUND as f64
    }

    /// `None` when the mask is empty.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 <= 0.0 {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// Remembers the last horizontal centroid that was backed by enough foreground.
#[derive(Debug, Clone, Default)]
pub struct CentroidTracker {
    last_x: Option<f64>,
}

impl CentroidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_x(&self) -> Option<f64> {
        self.last_x
    }

    /// Horizontal lane position in `mask`.
    ///
    /// A fresh centroid is taken when the foreground covers more than
    /// `min_size_percent` of the mask; otherwise the last known position is
    /// returned, or the centre of the mask if there is none.
    pub fn locate(&mut self, mask: &GrayImage, min_size_percent: f64) -> f64 {
        let moments = Moments::of(mask);
        let image_area = mask.width() as f64 * mask.height() as f64;

        if moments.area() > min_size_percent * image_area {
            if let Some((x, _)) = moments.centroid() {
                self.last_x = Some(x);
                return x;
            }
        }
        self.last_x.unwrap_or(mask.width() as f64 / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn column_band(width: u32, height: u32, columns: std::ops::Range<u32>) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if columns.contains(&x) { 255 } else { 0 }]))
    }

    #[test]
    fn area_counts_foreground_pixels() {
        let moments = Moments::of(&column_band(10, 4, 2..5));
        assert_eq!(moments.area(), 12.0);
        assert_eq!(moments.centroid(), Some((3.0, 1.5)));
    }

    #[test]
    fn empty_mask_has_no_centroid() {
        assert_eq!(Moments::of(&GrayImage::new(8, 8)).centroid(), None);
    }

    #[test]
    fn empty_mask_falls_back_to_centre_then_last_known() {
        let mut tracker = CentroidTracker::new();
        let empty = GrayImage::new(200, 10);
        assert_eq!(tracker.locate(&empty, 0.01), 100.0);

        assert_eq!(tracker.locate(&column_band(200, 10, 149..152), 0.01), 150.0);
        assert_eq!(tracker.locate(&empty, 0.01), 150.0);
    }

    #[test]
    fn specks_below_minimum_area_are_ignored() {
        let mut tracker = CentroidTracker::new();
        assert_eq!(tracker.locate(&column_band(100, 10, 20..30), 0.05), 24.5);
        // 10 of 1000 pixels is 1%, below the 5% minimum.
        assert_eq!(tracker.locate(&column_band(100, 10, 90..91), 0.05), 24.5);
        assert_eq!(tracker.last_x(), Some(24.5));
    }
}
