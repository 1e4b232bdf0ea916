// THEORY:
// The morphology strategy is the lane tracker. Each cycle it looks at the bottom
// slice of the frame, straightens the road plane, separates the (dark) lane from
// the floor, cleans the mask up, and steers toward the lane's centroid.
//
// Per-cycle stages:
// 1.  **ROI**: the bottom `roi_area` fraction of the frame.
// 2.  **Perspective**: keystone correction, then `offset` pixels cropped from each
//     side to drop the black wedges the warp leaves behind.
// 3.  **Colour reduction**: grey or HSV.
// 4.  **Binarisation**: Otsu or a fixed threshold, inverted so the lane is white.
// 5.  **Cleanup**: closing, then opening, with a cross-shaped kernel.
// 6.  **Centroid**: horizontal centre of the mask, with a fallback when the mask
//     is too sparse to trust.
// 7.  **Control**: normalised error, PID steer, differential speed mix.
//
// The only memory carried between cycles is the PID state, the last trusted
// centroid, and the cached perspective warp. All three live on the instance, so a
// fresh instance (a "restart") is a cold controller.

use std::time::Instant;

use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ParamValue, Parameters, parse_bool, parse_value};
use crate::core_modules::colour::{ColourReduced, ColourType};
use crate::core_modules::command::Payload;
use crate::core_modules::debug_buffer::{ColourHint, DebugImage};
use crate::core_modules::draw;
use crate::core_modules::mixer;
use crate::core_modules::moments::CentroidTracker;
use crate::core_modules::morphology::{self, CrossKernel};
use crate::core_modules::perspective::PerspectiveWarp;
use crate::core_modules::pid::{PidController, PidGains};
use crate::core_modules::strategy::{Cycle, Strategy};
use crate::core_modules::threshold::{self, ThresholdMode};
use crate::error::{ConfigError, ProcessError};

pub const NAME: &str = "morphology";

/// Radius of the centroid marker in the visual debug picture.
const MARKER_RADIUS: i64 = 4;

/// Largest structuring element and iteration count `validate` accepts.
pub const MAX_KERNEL_SIZE: u32 = 255;
pub const MAX_ITERATIONS: u32 = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    pub name: String,

    /// Pixels trimmed from each side after the perspective warp.
    pub offset: u32,
    /// Fraction of the frame height, counted from the bottom, that is analysed.
    pub roi_area: f64,
    pub colour_type: ColourType,

    /// Use Otsu's method instead of `threshold`.
    pub otsu: bool,
    pub threshold: u8,

    pub kernel_size: u32,
    pub open_iterations: u32,
    pub close_iterations: u32,

    /// Minimum foreground share of the mask before a new centroid is trusted.
    pub min_size_percent: f64,

    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Bound on the accumulated integral error.
    pub integral_limit: f64,

    /// How strongly steering separates the two side speeds.
    pub turn_gain: f64,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            name: NAME.to_string(),
            offset: 40,
            roi_area: 0.4,
            colour_type: ColourType::Grey,
            otsu: true,
            threshold: 150,
            kernel_size: 5,
            open_iterations: 1,
            close_iterations: 1,
            min_size_percent: 0.01,
            kp: 0.8,
            ki: 0.0,
            kd: 0.05,
            integral_limit: 1.0,
            turn_gain: 1.0,
        }
    }
}

impl MorphologyConfig {
    pub fn threshold_mode(&self) -> ThresholdMode {
        if self.otsu {
            ThresholdMode::Otsu
        } else {
            ThresholdMode::Fixed(self.threshold)
        }
    }

    pub fn gains(&self) -> PidGains {
        PidGains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            integral_limit: self.integral_limit,
        }
    }

    /// Rejects value combinations the tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: String| Err(ConfigError::Inconsistent(reason));
        if !(self.roi_area > 0.0 && self.roi_area <= 1.0) {
            return fail(format!("roi_area must be in (0, 1], got {}", self.roi_area));
        }
        if !(1..=MAX_KERNEL_SIZE).contains(&self.kernel_size) {
            return fail(format!("kernel_size must be in [1, {MAX_KERNEL_SIZE}], got {}", self.kernel_size));
        }
        if self.open_iterations.max(self.close_iterations) > MAX_ITERATIONS {
            return fail(format!("morphology iterations must not exceed {MAX_ITERATIONS}"));
        }
        if !(0.0..=1.0).contains(&self.min_size_percent) {
            return fail(format!("min_size_percent must be in [0, 1], got {}", self.min_size_percent));
        }
        if !(self.turn_gain.is_finite() && self.turn_gain >= 0.0) {
            return fail(format!("turn_gain must be a non-negative number, got {}", self.turn_gain));
        }
        if !(self.integral_limit.is_finite() && self.integral_limit >= 0.0) {
            return fail(format!("integral_limit must be a non-negative number, got {}", self.integral_limit));
        }
        if ![self.kp, self.ki, self.kd].iter().all(|gain| gain.is_finite()) {
            return fail("PID gains must be finite".to_string());
        }
        Ok(())
    }
}

impl Parameters for MorphologyConfig {
    fn parameter_names(&self) -> &'static [&'static str] {
        &[
            "name",
            "offset",
            "roi_area",
            "colour_type",
            "otsu",
            "threshold",
            "kernel_size",
            "open_iterations",
            "close_iterations",
            "min_size_percent",
            "kp",
            "ki",
            "kd",
            "integral_limit",
            "turn_gain",
        ]
    }

    fn parameter(&self, key: &str) -> Option<ParamValue> {
        let value = match key {
            "name" => ParamValue::Text(self.name.clone()),
            "offset" => ParamValue::Int(self.offset.into()),
            "roi_area" => ParamValue::Float(self.roi_area),
            "colour_type" => ParamValue::Text(self.colour_type.as_str().to_string()),
            "otsu" => ParamValue::Bool(self.otsu),
            "threshold" => ParamValue::Int(self.threshold.into()),
            "kernel_size" => ParamValue::Int(self.kernel_size.into()),
            "open_iterations" => ParamValue::Int(self.open_iterations.into()),
            "close_iterations" => ParamValue::Int(self.close_iterations.into()),
            "min_size_percent" => ParamValue::Float(self.min_size_percent),
            "kp" => ParamValue::Float(self.kp),
            "ki" => ParamValue::Float(self.ki),
            "kd" => ParamValue::Float(self.kd),
            "integral_limit" => ParamValue::Float(self.integral_limit),
            "turn_gain" => ParamValue::Float(self.turn_gain),
            _ => return None,
        };
        Some(value)
    }

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "name" => return Err(ConfigError::ReadOnly(key.to_string())),
            "offset" => self.offset = parse_value(key, value)?,
            "roi_area" => self.roi_area = parse_value(key, value)?,
            "colour_type" => {
                self.colour_type = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?
            }
            "otsu" => self.otsu = parse_bool(key, value)?,
            "threshold" => self.threshold = parse_value(key, value)?,
            "kernel_size" => self.kernel_size = parse_value(key, value)?,
            "open_iterations" => self.open_iterations = parse_value(key, value)?,
            "close_iterations" => self.close_iterations = parse_value(key, value)?,
            "min_size_percent" => self.min_size_percent = parse_value(key, value)?,
            "kp" => self.kp = parse_value(key, value)?,
            "ki" => self.ki = parse_value(key, value)?,
            "kd" => self.kd = parse_value(key, value)?,
            "integral_limit" => self.integral_limit = parse_value(key, value)?,
            "turn_gain" => self.turn_gain = parse_value(key, value)?,
            _ => return Err(ConfigError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }
}

/// The outcome of the control stage for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    pub centroid_x: f64,
    /// Lateral error, nominally in [-1, 1].
    pub error: f64,
    /// Clamped to [-1, 1].
    pub steer: f64,
    pub left: i32,
    pub right: i32,
}

pub struct MorphologyStrategy {
    config: MorphologyConfig,
    warp: Option<PerspectiveWarp>,
    tracker: CentroidTracker,
    pid: PidController,
}

impl MorphologyStrategy {
    pub fn new(config: MorphologyConfig) -> Self {
        let pid = PidController::new(config.gains());
        Self {
            config,
            warp: None,
            tracker: CentroidTracker::new(),
            pid,
        }
    }

    pub fn config(&self) -> &MorphologyConfig {
        &self.config
    }

    /// True until the first cycle has run.
    pub fn is_cold(&self) -> bool {
        self.pid.is_cold()
    }

    /// Turns a lane centroid within a mask of `width` pixels into side speeds.
    pub fn steer(&mut self, centroid_x: f64, width: u32, now: Instant) -> Steering {
        let half_width = width as f64 / 2.0;
        let error = (centroid_x - half_width) / half_width;
        let steer = self.pid.update(error, now);
        let (left, right) = mixer::mix(error, steer, self.config.turn_gain);
        Steering {
            centroid_x,
            error,
            steer,
            left,
            right,
        }
    }

    /// The cached warp for this geometry, rebuilt when the geometry changed.
    fn warp_for(&mut self, width: u32, roi_height: u32) -> Option<&PerspectiveWarp> {
        let offset = self.config.offset;
        let stale = self
            .warp
            .as_ref()
            .is_none_or(|warp| !warp.matches(width, roi_height, offset));
        if stale {
            debug!(width, roi_height, offset, "building perspective warp");
            self.warp = PerspectiveWarp::keystone(width, roi_height, offset);
        }
        self.warp.as_ref()
    }

    fn visualize(&self, mask: &image::GrayImage, steering: &Steering) -> RgbImage {
        let mut visual = draw::mask_to_rgb(mask);
        let height = visual.height() as i64;
        draw::vertical_line(&mut visual, (mask.width() / 2) as i64, draw::YELLOW);
        draw::filled_circle(&mut visual, (steering.centroid_x as i64, height - 5), MARKER_RADIUS, draw::RED);
        visual
    }
}

impl Strategy for MorphologyStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn handle(&mut self, cycle: &mut Cycle<'_>) -> Result<Vec<Payload>, ProcessError> {
        self.config.validate()?;
        let now = Instant::now();

        let frame = cycle.image();
        let (width, height) = frame.dimensions();
        let offset = self.config.offset;

        // --- 1. Region of interest ---
        let roi_height = (height as f64 * self.config.roi_area) as u32;
        if roi_height == 0 {
            return Err(cycle.frame_error(format!("frame height {height} leaves an empty region of interest")));
        }
        let working_width = match offset.checked_mul(2).and_then(|trim| width.checked_sub(trim)) {
            Some(working_width) if working_width > 0 => working_width,
            _ => return Err(cycle.frame_error(format!("frame width {width} must exceed twice the offset {offset}"))),
        };
        let roi = imageops::crop_imm(frame, 0, height - roi_height, width, roi_height).to_image();

        // --- 2. Perspective correction and crop ---
        let warped = match self.warp_for(width, roi_height) {
            Some(warp) => warp.apply(&roi),
            None => return Err(cycle.frame_error("perspective transform is degenerate")),
        };
        let width = working_width;
        let roi = imageops::crop_imm(&warped, offset, 0, width, roi_height).to_image();
        if cycle.debug_enabled() {
            cycle.debug_picture("1_roi", DebugImage::Rgb(roi.clone()), ColourHint::Rgb);
        }

        // --- 3. Colour reduction ---
        let reduced = ColourReduced::reduce(&roi, self.config.colour_type);
        if cycle.debug_enabled() {
            let (image, hint) = reduced.to_debug();
            cycle.debug_picture("2_colour", image, hint);
        }

        // --- 4. Binarisation ---
        let (mut mask, level) = threshold::binarize(&reduced.plane(), self.config.threshold_mode());
        if cycle.debug_enabled() {
            cycle.debug_picture("3_binary", DebugImage::Gray(mask.clone()), ColourHint::Gray);
        }
        threshold::invert(&mut mask);

        // --- 5. Morphological cleanup ---
        let kernel = CrossKernel::new(self.config.kernel_size);
        let mask = morphology::close(&mask, &kernel, self.config.close_iterations);
        let mask = morphology::open(&mask, &kernel, self.config.open_iterations);
        if cycle.debug_enabled() {
            cycle.debug_picture("4_morphology", DebugImage::Gray(mask.clone()), ColourHint::Gray);
        }

        // --- 6. Centroid ---
        let centroid_x = self.tracker.locate(&mask, self.config.min_size_percent);

        // --- 7. Steering and speed mix ---
        let steering = self.steer(centroid_x, width, now);
        if cycle.debug_enabled() {
            let visual = self.visualize(&mask, &steering);
            cycle.debug_picture(
                format!("5_visual_{:.3}_{}_{}", steering.steer, steering.left, steering.right),
                DebugImage::Rgb(visual),
                ColourHint::Rgb,
            );
        }

        debug!(
            frame_id = cycle.frame_id(),
            threshold = level,
            centroid_x = steering.centroid_x,
            error = steering.error,
            steer = steering.steer,
            left = steering.left,
            right = steering.right,
            "lane tracked"
        );

        Ok(vec![Payload::drive(steering.left, steering.right)])
    }
}
