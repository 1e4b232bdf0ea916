// THEORY:
// This file is the main entry point for the `lane_vision` library crate.
// It exposes the vision-guided control pipeline of a line-following vehicle:
// a camera frame goes in, an actuation command comes out, once per control cycle.
//
// The public surface is organised in layers:
// - `core_modules`: the data model (frames, commands, debug captures), the strategy
//   contract, and the image/control primitives the strategies are built from.
// - `strategies`: the concrete, pluggable algorithms (the morphology lane tracker
//   and a pass-through example).
// - `control`: the registry of known strategies and the `Control` that owns the
//   active one, switches it at runtime and throttles debug export.
// - `config`: YAML configuration and named, string-keyed parameter access.
// - `io`: reference implementations of the external collaborators (frame source,
//   command sink, debug exporter). The core never touches hardware itself.

pub mod config;
pub mod control;
pub mod core_modules;
pub mod error;
pub mod io;
pub mod strategies;

pub use control::{Control, ControlConfig, StrategyRegistry, StrategySettings};
pub use core_modules::command::{ActuatorTarget, Command, Payload};
pub use core_modules::frame::{Frame, Metadata};
pub use error::{ConfigError, ProcessError};
