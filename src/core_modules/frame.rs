// THEORY:
// A `Frame` is the single unit of input to a control cycle. It is a "dumb" data
// container: a pixel buffer in a fixed colour layout (RGB8), a monotonically
// increasing identifier assigned by the frame source, and an open metadata map the
// pipeline never interprets. The identifier is the correlation key that ties every
// command and every debug picture back to the frame that caused it.

use std::collections::BTreeMap;

use image::RgbImage;

/// Opaque per-frame metadata, passed through to every command unchanged.
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct Frame {
    /// Strictly increasing identifier assigned by the frame source.
    pub id: u64,
    /// The pixel buffer, always RGB8.
    pub image: RgbImage,
    pub metadata: Metadata,
}

impl Frame {
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            image,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
