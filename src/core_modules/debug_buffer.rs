// THEORY:
// The `DebugBuffer` is the per-cycle scratch list of intermediate pictures a
// strategy wants to expose. It lives for exactly one cycle: the strategy runner
// clears it before the strategy runs, the strategy appends to it while it works,
// and `Control` drains it right after. Draining moves the pictures out, so a
// background exporter owns its own copy and can never observe a buffer that a
// later cycle has since refilled.
//
// Producing debug pictures costs CPU every cycle, so the buffer carries the
// "enabled" switch. Strategies check `is_enabled` before building a picture and
// `append` discards anything offered while disabled.

use image::{GrayImage, RgbImage};

/// How an exporter should interpret the pixel buffer of a debug picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourHint {
    Rgb,
    Gray,
    /// Three channels holding hue (0..180), saturation and value.
    Hsv,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DebugImage {
    Rgb(RgbImage),
    Gray(GrayImage),
}

impl DebugImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DebugImage::Rgb(image) => image.dimensions(),
            DebugImage::Gray(image) => image.dimensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugEntry {
    pub description: String,
    pub image: DebugImage,
    pub hint: ColourHint,
}

#[derive(Debug, Default)]
pub struct DebugBuffer {
    enabled: bool,
    entries: Vec<DebugEntry>,
}

impl DebugBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn append(&mut self, description: impl Into<String>, image: DebugImage, hint: ColourHint) {
        if !self.enabled {
            return;
        }
        self.entries.push(DebugEntry {
            description: description.into(),
            image,
            hint,
        });
    }

    /// Returns every entry in insertion order and leaves the buffer empty.
    pub fn drain(&mut self) -> Vec<DebugEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
