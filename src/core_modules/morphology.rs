// THEORY:
// Morphological cleanup of a binary lane mask. Closing (dilate, then erode) fills
// small holes inside the lane; opening (erode, then dilate) removes isolated
// specks of noise outside it. Both use a cross-shaped structuring element: the
// centre row and centre column of a `size x size` square.
//
// Pixels beyond the image border never take part in a min/max, so the border
// neither erodes a lane touching the edge nor grows one into it.

use image::{GrayImage, Luma};

/// A cross-shaped structuring element, stored as offsets from its anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossKernel {
    offsets: Vec<(i64, i64)>,
}

impl CrossKernel {
    pub fn new(size: u32) -> Self {
        let size = size.max(1) as i64;
        let anchor = size / 2;
        let mut offsets = Vec::with_capacity((2 * size - 1) as usize);
        for i in 0..size {
            offsets.push((i - anchor, 0));
        }
        for i in 0..size {
            if i != anchor {
                offsets.push((0, i - anchor));
            }
        }
        Self { offsets }
    }

    pub fn offsets(&self) -> &[(i64, i64)] {
        &self.offsets
    }
}

fn apply<F>(mask: &GrayImage, kernel: &CrossKernel, init: u8, pick: F) -> GrayImage
where
    F: Fn(u8, u8) -> u8,
{
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let mut value = init;
        for &(dx, dy) in kernel.offsets() {
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            value = pick(value, mask.get_pixel(nx as u32, ny as u32).0[0]);
        }
        Luma([value])
    })
}

pub fn erode(mask: &GrayImage, kernel: &CrossKernel) -> GrayImage {
    apply(mask, kernel, u8::MAX, u8::min)
}

pub fn dilate(mask: &GrayImage, kernel: &CrossKernel) -> GrayImage {
    apply(mask, kernel, u8::MIN, u8::max)
}

/// `iterations` dilations followed by as many erosions.
pub fn close(mask: &GrayImage, kernel: &CrossKernel, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate(&out, kernel);
    }
    for _ in 0..iterations {
        out = erode(&out, kernel);
    }
    out
}

/// `iterations` erosions followed by as many dilations.
pub fn open(mask: &GrayImage, kernel: &CrossKernel, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, kernel);
    }
    for _ in 0..iterations {
        out = dilate(&out, kernel);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> GrayImage {
        GrayImage::new(width, height)
    }

    fn count_set(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == 255).count()
    }

    #[test]
    fn cross_kernel_shape() {
        let kernel = CrossKernel::new(3);
        let mut offsets = kernel.offsets().to_vec();
        offsets.sort();
        assert_eq!(offsets, [(-1, 0), (0, -1), (0, 0), (0, 1), (1, 0)]);
        assert_eq!(CrossKernel::new(5).offsets().len(), 9);
    }

    #[test]
    fn opening_removes_isolated_specks() {
        let mut mask = blank(20, 20);
        mask.put_pixel(3, 3, Luma([255]));
        for y in 8..16 {
            for x in 8..16 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let opened = open(&mask, &CrossKernel::new(3), 1);
        assert_eq!(opened.get_pixel(3, 3).0[0], 0);
        assert_eq!(opened.get_pixel(11, 11).0[0], 255);
    }

    #[test]
    fn closing_fills_small_holes() {
        let mut mask = GrayImage::from_pixel(15, 15, Luma([255]));
        mask.put_pixel(7, 7, Luma([0]));
        let closed = close(&mask, &CrossKernel::new(3), 1);
        assert_eq!(count_set(&closed), 15 * 15);
    }

    #[test]
    fn border_does_not_erode_a_full_mask() {
        let mask = GrayImage::from_pixel(6, 4, Luma([255]));
        assert_eq!(erode(&mask, &CrossKernel::new(5)), mask);
    }

    #[test]
    fn zero_iterations_leave_mask_untouched() {
        let mut mask = blank(5, 5);
        mask.put_pixel(2, 2, Luma([255]));
        let kernel = CrossKernel::new(3);
        assert_eq!(open(&mask, &kernel, 0), mask);
        assert_eq!(close(&mask, &kernel, 0), mask);
    }
}
