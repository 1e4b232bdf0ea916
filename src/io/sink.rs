//! Command sink contract and a sink that only logs.

use tracing::info;

use crate::core_modules::command::Command;
use crate::error::CommandError;

/// Consumes the commands of a control cycle.
pub trait CommandSink {
    fn handle_command(&mut self, command: &Command) -> Result<(), CommandError>;
}

/// Logs every command instead of driving hardware.
#[derive(Debug, Default)]
pub struct LogSink {
    handled: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands handled so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }
}

impl CommandSink for LogSink {
    fn handle_command(&mut self, command: &Command) -> Result<(), CommandError> {
        info!(
            frame_id = command.frame_id,
            target = ?command.target(),
            values = ?command.values(),
            "command"
        );
        self.handled += 1;
        Ok(())
    }
}
