// THEORY:
// A `FrameSource` hands out frames on demand with strictly increasing
// identifiers. `ImageDirSource` replays a directory of still images in file-name
// order, which makes recorded runs reproducible: the same directory always yields
// the same frame identifiers, and so the same debug-export cycles.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core_modules::frame::Frame;
use crate::error::SourceError;

/// Supplies frames to the control loop.
pub trait FrameSource {
    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Replays the image files of a directory as frames numbered from 1.
#[derive(Debug)]
pub struct ImageDirSource {
    files: std::vec::IntoIter<PathBuf>,
    next_id: u64,
}

impl ImageDirSource {
    /// Lists every file whose extension names a known image format.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let list_error = |source| SourceError::List {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(list_error)? {
            let path = entry.map_err(list_error)?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                files.push(path);
            }
        }
        files.sort();

        Ok(Self {
            files: files.into_iter(),
            next_id: 1,
        })
    }

    /// Frames not handed out yet.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.files.next() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .map_err(|source| SourceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        let frame = Frame::new(self.next_id, image).with_metadata("source", path.display().to_string());
        self.next_id += 1;
        Ok(Some(frame))
    }
}
