// THEORY:
// The `control` module is the top-level API of the pipeline. It encapsulates the
// strategy catalogue, the live strategy instance and the debug-export policy
// behind a single `Control::process(frame)` call made once per control cycle.
//
// Key architectural principles:
// 1.  **Closed catalogue**: `StrategySettings` is a tagged set of the concrete
//     strategy configs. The registry maps a strategy name to its settings, and
//     the settings are the factory: `instantiate` builds a fresh strategy.
// 2.  **Exclusive ownership**: `Control` is the only owner of the live strategy
//     (through its `StrategyRunner`). PID and tracking state die with the
//     instance, so resetting or switching is a plain replacement, never a
//     field-by-field reset.
// 3.  **Throttled debug capture**: the strategy only builds debug pictures on
//     cycles whose frame identifier is a multiple of `interval`. Those pictures
//     are drained right after the cycle and handed to the exporter by value.
// 4.  **Deferred configuration**: parameter writes land in the registry and take
//     effect at the next `reset_process` or `switch_strategy`, so PID state is
//     always consistent with the configuration that produced it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ParamValue, Parameters, StrategyConfigs};
use crate::core_modules::command::Command;
use crate::core_modules::frame::Frame;
use crate::core_modules::strategy::{Strategy, StrategyRunner};
use crate::error::{ConfigError, ProcessError};
use crate::io::exporter::DebugExporter;
use crate::strategies::example::{ExampleConfig, ExampleStrategy};
use crate::strategies::morphology::{MorphologyConfig, MorphologyStrategy};

/// Which strategy runs and how often it exports debug pictures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Name of the active strategy.
    pub used: String,
    /// Master switch for debug export.
    pub save_debug: bool,
    /// Export on every frame whose identifier is a multiple of this. 0 disables export.
    pub interval: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            used: crate::strategies::morphology::NAME.to_string(),
            save_debug: true,
            interval: 30,
        }
    }
}

impl ControlConfig {
    /// Whether the cycle for `frame_id` captures and exports debug pictures.
    pub fn debug_due(&self, frame_id: u64) -> bool {
        self.save_debug && self.interval > 0 && frame_id % self.interval == 0
    }
}

/// The configuration of one registered strategy, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategySettings {
    Example(ExampleConfig),
    Morphology(MorphologyConfig),
}

impl StrategySettings {
    /// The registry key.
    pub fn name(&self) -> &str {
        match self {
            StrategySettings::Example(config) => &config.name,
            StrategySettings::Morphology(config) => &config.name,
        }
    }

    /// Builds a fresh, cold strategy from these settings.
    pub fn instantiate(&self) -> Box<dyn Strategy> {
        match self {
            StrategySettings::Example(config) => Box::new(ExampleStrategy::new(config.clone())),
            StrategySettings::Morphology(config) => Box::new(MorphologyStrategy::new(config.clone())),
        }
    }

    fn params(&self) -> &dyn Parameters {
        match self {
            StrategySettings::Example(config) => config,
            StrategySettings::Morphology(config) => config,
        }
    }

    fn params_mut(&mut self) -> &mut dyn Parameters {
        match self {
            StrategySettings::Example(config) => config,
            StrategySettings::Morphology(config) => config,
        }
    }
}

impl Parameters for StrategySettings {
    fn parameter_names(&self) -> &'static [&'static str] {
        self.params().parameter_names()
    }

    fn parameter(&self, key: &str) -> Option<ParamValue> {
        self.params().parameter(key)
    }

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.params_mut().set_parameter(key, value)
    }
}

/// Known strategies keyed by name, one configuration each.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, StrategySettings>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in strategy with its default configuration.
    pub fn builtin() -> Self {
        Self::from_configs(&StrategyConfigs::default())
    }

    pub fn from_configs(configs: &StrategyConfigs) -> Self {
        let mut registry = Self::new();
        registry.register(StrategySettings::Example(configs.example.clone()));
        registry.register(StrategySettings::Morphology(configs.morphology.clone()));
        registry
    }

    /// Adds `settings` under its name, returning the entry it replaced.
    pub fn register(&mut self, settings: StrategySettings) -> Option<StrategySettings> {
        self.entries.insert(settings.name().to_string(), settings)
    }

    pub fn get(&self, name: &str) -> Option<&StrategySettings> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn set_parameter(&mut self, name: &str, key: &str, value: &str) -> Result<(), ProcessError> {
        let settings = self
            .entries
            .get_mut(name)
            .ok_or_else(|| ProcessError::UnknownStrategy(name.to_string()))?;
        settings.set_parameter(key, value)?;
        Ok(())
    }

    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Strategy>, ProcessError> {
        self.get(name)
            .map(StrategySettings::instantiate)
            .ok_or_else(|| ProcessError::UnknownStrategy(name.to_string()))
    }
}

/// Owns the active strategy and runs it once per control cycle.
pub struct Control {
    config: ControlConfig,
    registry: StrategyRegistry,
    runner: Option<StrategyRunner>,
    exporter: Box<dyn DebugExporter>,
}

impl Control {
    /// A control running the strategy named by `config.used`.
    pub fn new(
        config: ControlConfig,
        registry: StrategyRegistry,
        exporter: Box<dyn DebugExporter>,
    ) -> Result<Self, ProcessError> {
        let mut control = Self::idle(config, registry, exporter);
        control.reset_process()?;
        Ok(control)
    }

    /// A control with no active strategy until `reset_process` or `switch_strategy`.
    pub fn idle(config: ControlConfig, registry: StrategyRegistry, exporter: Box<dyn DebugExporter>) -> Self {
        Self {
            config,
            registry,
            runner: None,
            exporter,
        }
    }

    /// Runs one control cycle.
    pub fn process(&mut self, frame: &Frame) -> Result<Vec<Command>, ProcessError> {
        let runner = self.runner.as_mut().ok_or(ProcessError::NoActiveStrategy)?;

        let capture = self.config.debug_due(frame.id);
        runner.set_debug(capture);
        let commands = runner.process(frame)?;

        if capture {
            for entry in runner.read_debug() {
                let description = entry.description.clone();
                if let Err(err) = self.exporter.export(frame.id, entry) {
                    warn!(frame_id = frame.id, %description, error = %err, "debug export failed");
                }
            }
        }
        Ok(commands)
    }

    /// Replaces the active strategy with a fresh instance of the configured one.
    pub fn reset_process(&mut self) -> Result<(), ProcessError> {
        let strategy = self.registry.instantiate(&self.config.used)?;
        self.runner = Some(StrategyRunner::new(strategy));
        info!(strategy = %self.config.used, "strategy instantiated");
        Ok(())
    }

    /// Makes `name` the active strategy. The previous instance and its state are dropped.
    pub fn switch_strategy(&mut self, name: &str) -> Result<(), ProcessError> {
        let strategy = self.registry.instantiate(name)?;
        let previous = std::mem::replace(&mut self.config.used, name.to_string());
        self.runner = Some(StrategyRunner::new(strategy));
        info!(from = %previous, to = %name, "strategy switched");
        Ok(())
    }

    /// Replaces the control configuration and restarts the (possibly new) active strategy.
    pub fn set_config(&mut self, config: ControlConfig) -> Result<(), ProcessError> {
        let strategy = self.registry.instantiate(&config.used)?;
        self.config = config;
        self.runner = Some(StrategyRunner::new(strategy));
        info!(
            strategy = %self.config.used,
            save_debug = self.config.save_debug,
            interval = self.config.interval,
            "control reconfigured"
        );
        Ok(())
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn strategy_config(&self, name: &str) -> Option<&StrategySettings> {
        self.registry.get(name)
    }

    /// Updates a registered configuration. Takes effect at the next reset or switch.
    pub fn set_parameter(&mut self, strategy: &str, key: &str, value: &str) -> Result<(), ProcessError> {
        self.registry.set_parameter(strategy, key, value)?;
        info!(%strategy, %key, %value, "parameter updated");
        Ok(())
    }

    /// Name of the live strategy, if any.
    pub fn active_strategy(&self) -> Option<&str> {
        self.runner.as_ref().map(StrategyRunner::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::command::Payload;
    use crate::core_modules::debug_buffer::DebugEntry;
    use crate::error::ExportError;
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        exported: Arc<Mutex<Vec<String>>>,
    }

    impl DebugExporter for Recorder {
        fn export(&self, frame_id: u64, entry: DebugEntry) -> Result<(), ExportError> {
            self.exported.lock().unwrap().push(format!("{frame_id}_{}", entry.description));
            Ok(())
        }
    }

    struct Broken;

    impl DebugExporter for Broken {
        fn export(&self, _: u64, _: DebugEntry) -> Result<(), ExportError> {
            Err(ExportError::Closed)
        }
    }

    fn control_config(used: &str, interval: u64) -> ControlConfig {
        ControlConfig {
            used: used.to_string(),
            save_debug: true,
            interval,
        }
    }

    fn frame(id: u64) -> Frame {
        Frame::new(id, RgbImage::from_pixel(280, 200, Rgb([200, 200, 200])))
    }

    fn lane_frame(id: u64, columns: std::ops::Range<u32>) -> Frame {
        let image = RgbImage::from_fn(280, 200, |x, _| {
            if columns.contains(&x) { Rgb([20, 20, 20]) } else { Rgb([220, 220, 220]) }
        });
        Frame::new(id, image)
    }

    #[test]
    fn commands_carry_the_frame_identity() {
        let mut control =
            Control::new(control_config("example", 30), StrategyRegistry::builtin(), Box::new(Recorder::default()))
                .unwrap();
        let frame = frame(17).with_metadata("source", "frames/017.png");

        let commands = control.process(&frame).unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].frame_id, 17);
        assert_eq!(commands[0].metadata, frame.metadata);
        assert_eq!(commands[0].payload, Payload::drive(80, 80));
    }

    #[test]
    fn debug_export_runs_only_on_interval_frames() {
        let recorder = Recorder::default();
        let mut control =
            Control::new(control_config("example", 3), StrategyRegistry::builtin(), Box::new(recorder.clone())).unwrap();

        for id in 1..=9 {
            control.process(&frame(id)).unwrap();
        }

        assert_eq!(*recorder.exported.lock().unwrap(), ["3_example", "6_example", "9_example"]);
    }

    #[test]
    fn debug_export_respects_the_switch_and_zero_interval() {
        assert!(!ControlConfig { save_debug: false, ..control_config("example", 1) }.debug_due(5));
        assert!(!control_config("example", 0).debug_due(0));
        assert!(control_config("example", 5).debug_due(10));

        let recorder = Recorder::default();
        let mut control =
            Control::new(control_config("example", 0), StrategyRegistry::builtin(), Box::new(recorder.clone())).unwrap();
        for id in 0..4 {
            control.process(&frame(id)).unwrap();
        }
        assert!(recorder.exported.lock().unwrap().is_empty());
    }

    #[test]
    fn morphology_exports_every_stage_on_a_debug_cycle() {
        let recorder = Recorder::default();
        let mut control = Control::new(
            control_config("morphology", 30),
            StrategyRegistry::builtin(),
            Box::new(recorder.clone()),
        )
        .unwrap();

        control.process(&lane_frame(30, 130..150)).unwrap();

        let exported = recorder.exported.lock().unwrap();
        assert_eq!(exported.len(), 5);
        assert_eq!(exported[0], "30_1_roi");
        assert!(exported[4].starts_with("30_5_visual_"));
    }

    #[test]
    fn export_failure_does_not_fail_the_cycle() {
        let mut control =
            Control::new(control_config("example", 1), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        assert!(control.process(&frame(1)).is_ok());
    }

    #[test]
    fn idle_control_has_no_active_strategy() {
        let mut control = Control::idle(ControlConfig::default(), StrategyRegistry::builtin(), Box::new(Broken));
        assert_eq!(control.active_strategy(), None);
        assert!(matches!(control.process(&frame(1)), Err(ProcessError::NoActiveStrategy)));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result = Control::new(control_config("canny", 30), StrategyRegistry::builtin(), Box::new(Broken));
        assert!(matches!(result, Err(ProcessError::UnknownStrategy(name)) if name == "canny"));

        let mut control = Control::new(ControlConfig::default(), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        assert!(matches!(control.switch_strategy("canny"), Err(ProcessError::UnknownStrategy(_))));
        assert_eq!(control.active_strategy(), Some("morphology"));
        assert_eq!(control.config().used, "morphology");
    }

    #[test]
    fn switching_replaces_the_live_strategy() {
        let mut control = Control::new(ControlConfig::default(), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        control.switch_strategy("example").unwrap();

        assert_eq!(control.active_strategy(), Some("example"));
        assert_eq!(control.config().used, "example");
        assert_eq!(control.process(&frame(1)).unwrap()[0].payload, Payload::drive(80, 80));
    }

    #[test]
    fn parameter_changes_wait_for_a_reset() {
        let mut control =
            Control::new(control_config("example", 30), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        control.set_parameter("example", "speed", "120").unwrap();

        assert_eq!(control.strategy_config("example").unwrap().parameter("speed"), Some(ParamValue::Int(120)));
        assert_eq!(control.process(&frame(1)).unwrap()[0].payload, Payload::drive(80, 80));

        control.reset_process().unwrap();
        assert_eq!(control.process(&frame(2)).unwrap()[0].payload, Payload::drive(120, 120));
    }

    #[test]
    fn parameter_errors_name_the_problem() {
        let mut control = Control::new(ControlConfig::default(), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        assert!(matches!(
            control.set_parameter("canny", "kp", "1"),
            Err(ProcessError::UnknownStrategy(_))
        ));
        assert!(matches!(
            control.set_parameter("morphology", "colour_type", "rgb"),
            Err(ProcessError::Configuration(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn set_config_restarts_the_selected_strategy() {
        let mut control = Control::new(ControlConfig::default(), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        control.set_config(control_config("example", 5)).unwrap();
        assert_eq!(control.active_strategy(), Some("example"));
        assert_eq!(control.config().interval, 5);

        assert!(control.set_config(control_config("canny", 5)).is_err());
        assert_eq!(control.config().used, "example");
    }

    #[test]
    fn reset_discards_pid_state() {
        let config = ControlConfig {
            save_debug: false,
            ..ControlConfig::default()
        };
        let left = lane_frame(1, 60..85);
        let right = lane_frame(2, 195..220);

        let mut fresh = Control::new(config.clone(), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        let cold = fresh.process(&right).unwrap();

        let mut control = Control::new(config, StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        control.process(&left).unwrap();
        let warm = control.process(&right).unwrap();
        assert_ne!(warm, cold);

        control.reset_process().unwrap();
        assert_eq!(control.process(&right).unwrap(), cold);
    }

    #[test]
    fn switch_then_reset_starts_cold() {
        let config = ControlConfig {
            save_debug: false,
            ..ControlConfig::default()
        };
        let left = lane_frame(1, 60..85);
        let right = lane_frame(2, 195..220);

        let mut fresh = Control::new(config.clone(), StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        let cold = fresh.process(&right).unwrap();

        let mut control = Control::new(config, StrategyRegistry::builtin(), Box::new(Broken)).unwrap();
        control.process(&left).unwrap();
        assert_ne!(control.process(&right).unwrap(), cold);

        control.switch_strategy("example").unwrap();
        assert_eq!(control.process(&left).unwrap()[0].payload, Payload::drive(80, 80));
        control.switch_strategy("morphology").unwrap();
        control.reset_process().unwrap();

        assert_eq!(control.active_strategy(), Some("morphology"));
        assert_eq!(control.process(&right).unwrap(), cold);
    }

    #[test]
    fn registry_keeps_one_config_per_name() {
        let mut registry = StrategyRegistry::builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["example", "morphology"]);

        let tuned = MorphologyConfig {
            kp: 2.0,
            ..MorphologyConfig::default()
        };
        let previous = registry.register(StrategySettings::Morphology(tuned));
        assert!(matches!(previous, Some(StrategySettings::Morphology(config)) if config.kp == 0.8));
        assert_eq!(registry.names().count(), 2);
        assert_eq!(registry.get("morphology").unwrap().parameter("kp"), Some(ParamValue::Float(2.0)));
    }
}
