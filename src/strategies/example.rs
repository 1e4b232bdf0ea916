// THEORY:
// The example strategy is the smallest complete `Strategy`: it ignores the image
// content, drives both sides at a fixed speed, and exposes the raw frame as its
// only debug picture. It exists to exercise the registry, debug and command paths
// end to end without any vision code in the way.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ParamValue, Parameters, parse_value};
use crate::core_modules::command::Payload;
use crate::core_modules::debug_buffer::{ColourHint, DebugImage};
use crate::core_modules::mixer::MAX_SPEED;
use crate::core_modules::strategy::{Cycle, Strategy};
use crate::error::{ConfigError, ProcessError};

pub const NAME: &str = "example";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleConfig {
    pub name: String,
    pub description: String,
    /// Speed applied to both sides, clamped to the actuator range.
    pub speed: i32,
}

impl Default for ExampleConfig {
    fn default() -> Self {
        Self {
            name: NAME.to_string(),
            description: "Example process".to_string(),
            speed: 80,
        }
    }
}

impl Parameters for ExampleConfig {
    fn parameter_names(&self) -> &'static [&'static str] {
        &["name", "description", "speed"]
    }

    fn parameter(&self, key: &str) -> Option<ParamValue> {
        match key {
            "name" => Some(ParamValue::Text(self.name.clone())),
            "description" => Some(ParamValue::Text(self.description.clone())),
            "speed" => Some(ParamValue::Int(self.speed.into())),
            _ => None,
        }
    }

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "name" => return Err(ConfigError::ReadOnly(key.to_string())),
            "description" => self.description = value.to_string(),
            "speed" => self.speed = parse_value(key, value)?,
            _ => return Err(ConfigError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }
}

pub struct ExampleStrategy {
    config: ExampleConfig,
}

impl ExampleStrategy {
    pub fn new(config: ExampleConfig) -> Self {
        Self { config }
    }
}

impl Strategy for ExampleStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn handle(&mut self, cycle: &mut Cycle<'_>) -> Result<Vec<Payload>, ProcessError> {
        if cycle.debug_enabled() {
            let raw = cycle.image().clone();
            cycle.debug_picture("example", DebugImage::Rgb(raw), ColourHint::Rgb);
        }
        let speed = self.config.speed.clamp(0, MAX_SPEED);
        debug!(frame_id = cycle.frame_id(), description = %self.config.description, speed, "example cycle");
        Ok(vec![Payload::drive(speed, speed)])
    }
}
