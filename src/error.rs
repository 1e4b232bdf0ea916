//! Error types shared across the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::core_modules::command::ActuatorTarget;

/// Problems with configuration values or the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("invalid value `{value}` for parameter `{key}`")]
    InvalidValue { key: String, value: String },
    #[error("parameter `{0}` is read-only")]
    ReadOnly(String),
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file")]
    Parse(#[from] serde_yaml::Error),
}

/// Failures of a single control cycle.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("frame {frame_id} cannot be processed: {reason}")]
    FrameProcessing { frame_id: u64, reason: String },
    #[error("no active strategy")]
    NoActiveStrategy,
    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),
}

/// Malformed actuation commands.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("{target:?} payload must hold {expected} values, got {actual}")]
    PayloadLength {
        target: ActuatorTarget,
        expected: usize,
        actual: usize,
    },
}

/// Failures while persisting debug pictures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("debug export i/o failed")]
    Io(#[from] std::io::Error),
    #[error("debug image encoding failed")]
    Image(#[from] image::ImageError),
    #[error("background exporter has shut down")]
    Closed,
}

/// Failures while acquiring frames.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to list frames in {path:?}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode frame {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
