// THEORY:
// The `perspective` module corrects the keystone distortion a forward-tilted
// camera introduces on the road plane. The region of interest is a rectangle in
// the image, but the road it shows is a trapezoid: parallel lane edges converge
// toward the top. Mapping the rectangle onto a trapezoid whose bottom corners are
// pulled inwards by a fixed `offset` straightens them again.
//
// Key architectural principles:
// 1.  **Exact four-point homography**: the 3x3 matrix is solved directly from the
//     four corner correspondences (an 8x8 linear system with h33 fixed at 1), so
//     the configured corners land exactly where they are asked to.
// 2.  **Inverse mapping**: warping walks the *output* pixels and samples the input
//     through the inverse matrix with bilinear interpolation. Samples falling
//     outside the input read as black, which is why the caller crops `offset`
//     pixels from each side afterwards.
// 3.  **Cached per geometry**: a `PerspectiveWarp` remembers the (width, ROI height,
//     offset) it was built for, so its owner can tell when it has gone stale.

use image::{Rgb, RgbImage};

const SINGULAR_EPSILON: f64 = 1e-12;

pub type Point2 = (f64, f64);

/// A planar projective transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    pub m: [[f64; 3]; 3],
}

impl Homography {
    /// Solves the transform mapping each `src[i]` onto `dst[i]`.
    /// Returns `None` for degenerate (e.g. collinear) correspondences.
    pub fn from_correspondences(src: &[Point2; 4], dst: &[Point2; 4]) -> Option<Self> {
        // Each correspondence contributes two rows of A·h = b.
        let mut system = [[0.0f64; 9]; 8];
        for (i, (&(x, y), &(u, v))) in src.iter().zip(dst.iter()).enumerate() {
            system[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            system[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }
        let h = solve_linear_system(system)?;
        Some(Self {
            m: [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]],
        })
    }

    /// Maps a point; `None` when it lands on the line at infinity.
    pub fn project(&self, (x, y): Point2) -> Option<Point2> {
        let m = &self.m;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w.abs() < SINGULAR_EPSILON {
            return None;
        }
        Some((
            (m[0][0] * x + m[0][1] * y + m[0][2]) / w,
            (m[1][0] * x + m[1][1] * y + m[1][2]) / w,
        ))
    }

    pub fn inverse(&self) -> Option<Self> {
        let m = &self.m;
        let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0];

        let det = m[0][0] * cofactor(1, 2, 1, 2) - m[0][1] * cofactor(1, 2, 0, 2) + m[0][2] * cofactor(1, 2, 0, 1);
        if det.abs() < SINGULAR_EPSILON {
            return None;
        }

        let adjugate = [
            [cofactor(1, 2, 1, 2), -cofactor(0, 2, 1, 2), cofactor(0, 1, 1, 2)],
            [-cofactor(1, 2, 0, 2), cofactor(0, 2, 0, 2), -cofactor(0, 1, 0, 2)],
            [cofactor(1, 2, 0, 1), -cofactor(0, 2, 0, 1), cofactor(0, 1, 0, 1)],
        ];
        let mut inv = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                inv[r][c] = adjugate[r][c] / det;
            }
        }
        Some(Self { m: inv })
    }
}

/// Gauss-Jordan elimination with partial pivoting on an augmented 8x9 matrix.
fn solve_linear_system(mut a: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    const N: usize = 8;
    for col in 0..N {
        let pivot = (col..N).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_EPSILON {
            return None;
        }
        a.swap(col, pivot);

        let lead = a[col][col];
        for k in col..=N {
            a[col][k] /= lead;
        }
        for row in 0..N {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=N {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut solution = [0.0; N];
    for (i, value) in solution.iter_mut().enumerate() {
        *value = a[i][N];
    }
    Some(solution)
}

/// The keystone correction for one ROI geometry.
#[derive(Debug, Clone)]
pub struct PerspectiveWarp {
    width: u32,
    roi_height: u32,
    offset: u32,
    forward: Homography,
    inverse: Homography,
}

impl PerspectiveWarp {
    /// Maps the full `width x roi_height` rectangle onto a trapezoid whose bottom
    /// corners are inset by `offset` on each side.
    pub fn keystone(width: u32, roi_height: u32, offset: u32) -> Option<Self> {
        let (w, h, o) = (width as f64, roi_height as f64, offset as f64);
        let src = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let dst = [(0.0, 0.0), (w, 0.0), (w - o, h), (o, h)];

        let forward = Homography::from_correspondences(&src, &dst)?;
        let inverse = forward.inverse()?;
        Some(Self {
            width,
            roi_height,
            offset,
            forward,
            inverse,
        })
    }

    /// Whether this warp was built for the given geometry.
    pub fn matches(&self, width: u32, roi_height: u32, offset: u32) -> bool {
        self.width == width && self.roi_height == roi_height && self.offset == offset
    }

    pub fn forward(&self) -> &Homography {
        &self.forward
    }

    /// Warps `roi` into an output of the same size.
    pub fn apply(&self, roi: &RgbImage) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.roi_height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            if let Some(source) = self.inverse.project((x as f64, y as f64)) {
                *pixel = sample_bilinear(roi, source);
            }
        }
        out
    }
}

/// Bilinear sample with a constant black border.
fn sample_bilinear(image: &RgbImage, (x, y): Point2) -> Rgb<u8> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |px: i64, py: i64| -> [f64; 3] {
        if px < 0 || py < 0 || px >= width || py >= height {
            return [0.0; 3];
        }
        let Rgb(c) = *image.get_pixel(px as u32, py as u32);
        [c[0] as f64, c[1] as f64, c[2] as f64]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let value = p00[c] * (1.0 - fx) * (1.0 - fy) + p10[c] * fx * (1.0 - fy) + p01[c] * (1.0 - fx) * fy + p11[c] * fx * fy;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
