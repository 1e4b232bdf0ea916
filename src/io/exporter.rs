// THEORY:
// Debug export is the only I/O a control cycle triggers itself, so it is kept
// behind a trait and can be moved off the control thread.
//
// - `PngExporter` writes one PNG per entry. HSV buffers are converted back to
//   RGB first so the files are viewable; masks are written single-channel.
// - `BackgroundExporter` is a channel front for any other exporter. Entries are
//   moved into the channel, so a later cycle can never touch a picture that is
//   still waiting to be written. A single tokio task drains the channel and runs
//   each blocking write on the blocking pool, preserving submission order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ExtendedColorType, ImageEncoder, RgbImage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core_modules::colour::hsv_to_rgb;
use crate::core_modules::debug_buffer::{ColourHint, DebugEntry, DebugImage};
use crate::error::ExportError;

/// Persists debug pictures.
pub trait DebugExporter: Send + Sync {
    fn export(&self, frame_id: u64, entry: DebugEntry) -> Result<(), ExportError>;
}

/// The file stem every exporter uses for an entry.
pub fn export_name(frame_id: u64, description: &str) -> String {
    format!("{frame_id}_{description}")
}

/// Writes debug pictures as PNG files into one directory.
#[derive(Debug, Clone)]
pub struct PngExporter {
    dir: PathBuf,
}

impl PngExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, frame_id: u64, description: &str) -> PathBuf {
        self.dir.join(format!("{}.png", export_name(frame_id, description)))
    }

    /// Removes every exported picture from the directory.
    pub fn clear(&self) -> Result<usize, ExportError> {
        let mut removed = 0;
        for (_, path) in self.exported_files()? {
            fs::remove_file(path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// The pictures of the most recent frame that has any, sorted by name.
    pub fn latest_batch(&self) -> Result<Vec<PathBuf>, ExportError> {
        let files = self.exported_files()?;
        let Some(latest) = files.iter().map(|(id, _)| *id).max() else {
            return Ok(Vec::new());
        };
        let mut batch: Vec<PathBuf> = files
            .into_iter()
            .filter(|(id, _)| *id == latest)
            .map(|(_, path)| path)
            .collect();
        batch.sort();
        Ok(batch)
    }

    /// `(frame_id, path)` for every PNG named like an export.
    fn exported_files(&self) -> Result<Vec<(u64, PathBuf)>, ExportError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("png") {
                continue;
            }
            let frame_id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.split_once('_'))
                .and_then(|(id, _)| id.parse::<u64>().ok());
            if let Some(frame_id) = frame_id {
                files.push((frame_id, path));
            }
        }
        Ok(files)
    }
}

impl DebugExporter for PngExporter {
    fn export(&self, frame_id: u64, entry: DebugEntry) -> Result<(), ExportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(frame_id, &entry.description);
        let output = fs::File::create(&path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        match (entry.image, entry.hint) {
            (DebugImage::Gray(mask), _) => {
                encoder.write_image(mask.as_raw(), mask.width(), mask.height(), ExtendedColorType::L8)?
            }
            (DebugImage::Rgb(hsv), ColourHint::Hsv) => {
                let rgb = hsv_image_to_rgb(&hsv);
                encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?
            }
            (DebugImage::Rgb(rgb), _) => {
                encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?
            }
        }

        debug!(path = %path.display(), "debug picture written");
        Ok(())
    }
}

fn hsv_image_to_rgb(hsv: &RgbImage) -> RgbImage {
    let mut rgb = hsv.clone();
    for pixel in rgb.pixels_mut() {
        let [h, s, v] = pixel.0;
        pixel.0 = hsv_to_rgb(h, s, v);
    }
    rgb
}

/// Forwards entries to another exporter running on a tokio task.
pub struct BackgroundExporter {
    sender: mpsc::UnboundedSender<(u64, DebugEntry)>,
}

impl BackgroundExporter {
    /// Starts the export task. Must be called from within a tokio runtime.
    ///
    /// The task ends once every `BackgroundExporter` handle has been dropped and
    /// the queue is drained; await the returned handle to flush on shutdown.
    pub fn spawn(inner: Arc<dyn DebugExporter>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<(u64, DebugEntry)>();

        let worker = tokio::spawn(async move {
            while let Some((frame_id, entry)) = receiver.recv().await {
                let exporter = Arc::clone(&inner);
                let description = entry.description.clone();
                match tokio::task::spawn_blocking(move || exporter.export(frame_id, entry)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(frame_id, %description, error = %err, "debug export failed"),
                    Err(err) => warn!(frame_id, %description, error = %err, "debug export task panicked"),
                }
            }
        });

        (Self { sender }, worker)
    }
}

impl DebugExporter for BackgroundExporter {
    fn export(&self, frame_id: u64, entry: DebugEntry) -> Result<(), ExportError> {
        self.sender.send((frame_id, entry)).map_err(|_| ExportError::Closed)
    }
}
