//! Concrete strategies. Each submodule pairs a serde config with the `Strategy`
//! it instantiates.

pub mod example;
pub mod morphology;
