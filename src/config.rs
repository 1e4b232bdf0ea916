// THEORY:
// Configuration has two faces.
//
// 1.  **Files**: `AppConfig` is the whole tree (control policy, runner paths, one
//     section per strategy) and is loaded from YAML with serde. Every section
//     falls back to its defaults, so a file only needs the values it changes.
// 2.  **Named access**: an operator console or web layer edits strategy settings
//     by string key without knowing the concrete config type. `Parameters` is
//     that seam: a closed set of primitive value kinds (`ParamValue`), read by key
//     and written from text. Writes go to the registered config, never to a live
//     strategy; they take effect when the strategy is next instantiated.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::control::ControlConfig;
use crate::error::ConfigError;
use crate::strategies::example::ExampleConfig;
use crate::strategies::morphology::MorphologyConfig;

/// A single configuration value as seen through `Parameters`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// String-keyed access to a configuration.
pub trait Parameters {
    fn parameter_names(&self) -> &'static [&'static str];

    fn parameter(&self, key: &str) -> Option<ParamValue>;

    /// Parses `value` and stores it under `key`.
    fn set_parameter(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Every parameter with its current value, in declaration order.
    fn parameters(&self) -> Vec<(&'static str, ParamValue)> {
        self.parameter_names()
            .iter()
            .filter_map(|&key| self.parameter(key).map(|value| (key, value)))
            .collect()
    }
}

/// Parses a parameter value, mapping failures to `ConfigError::InvalidValue`.
pub fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Accepts the usual spellings of a boolean switch.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Settings of the runner binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory the frames are read from.
    pub input_dir: PathBuf,
    /// Directory debug pictures are written to.
    pub debug_dir: PathBuf,
    /// Remove previous debug pictures on start-up.
    pub clear_debug_dir: bool,
    /// Export debug pictures from a background task instead of inline.
    pub background_export: bool,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./frames"),
            debug_dir: PathBuf::from("./debug"),
            clear_debug_dir: true,
            background_export: true,
            log_filter: "lane_vision=info".to_string(),
        }
    }
}

/// Per-strategy configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfigs {
    pub example: ExampleConfig,
    pub morphology: MorphologyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub control: ControlConfig,
    pub runner: RunnerConfig,
    pub strategies: StrategyConfigs,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::colour::ColourType;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "control:\n  used: example\n  interval: 10\nstrategies:\n  morphology:\n    kp: 1.2\n    colour_type: hsv\n",
        )
        .unwrap();

        assert_eq!(config.control.used, "example");
        assert_eq!(config.control.interval, 10);
        assert!(config.control.save_debug);
        assert_eq!(config.strategies.morphology.kp, 1.2);
        assert_eq!(config.strategies.morphology.colour_type, ColourType::Hsv);
        assert_eq!(config.strategies.morphology.offset, 40);
        assert_eq!(config.strategies.example.speed, 80);
        assert_eq!(config.runner.debug_dir, PathBuf::from("./debug"));
    }

    #[test]
    fn unknown_colour_selector_is_rejected() {
        let result = AppConfig::from_yaml("strategies:\n  morphology:\n    colour_type: rgb\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = AppConfig::load("/nonexistent/lane_vision.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(parse_bool("otsu", "ON").unwrap(), true);
        assert_eq!(parse_bool("otsu", "0").unwrap(), false);
        assert!(parse_bool("otsu", "maybe").is_err());
    }

    #[test]
    fn param_values_display_plainly() {
        assert_eq!(ParamValue::Float(0.8).to_string(), "0.8");
        assert_eq!(ParamValue::Text("grey".into()).to_string(), "grey");
    }
}
