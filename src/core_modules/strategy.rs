// THEORY:
// The `strategy` module defines the contract every pluggable vision-to-command
// algorithm satisfies, so that `Control` can stay algorithm-agnostic.
//
// Key architectural principles:
// 1.  **One method to implement**: a concrete strategy only implements `handle`.
//     Everything around it (clearing the debug buffer, exposing the current frame,
//     stamping the frame identifier and metadata onto the output) is done once,
//     by `StrategyRunner::process`.
// 2.  **Borrowed frame**: the strategy sees the frame through a `Cycle`, which
//     lends the pixel buffer immutably for the duration of one call. The input
//     frame is never mutated.
// 3.  **Owned state**: the runner exclusively owns the strategy instance and its
//     debug buffer. Replacing the runner is the only way to discard strategy state.

use image::RgbImage;

use crate::core_modules::command::{Command, Payload};
use crate::core_modules::debug_buffer::{ColourHint, DebugBuffer, DebugEntry, DebugImage};
use crate::core_modules::frame::Frame;
use crate::error::ProcessError;

/// A vision-to-command algorithm.
pub trait Strategy: Send {
    /// The registry name of the strategy.
    fn name(&self) -> &str;

    /// Computes the actuation(s) for the current frame.
    fn handle(&mut self, cycle: &mut Cycle<'_>) -> Result<Vec<Payload>, ProcessError>;
}

/// The view a strategy has of the control cycle it is running in.
pub struct Cycle<'a> {
    frame_id: u64,
    image: &'a RgbImage,
    debug: &'a mut DebugBuffer,
}

impl<'a> Cycle<'a> {
    pub fn new(frame_id: u64, image: &'a RgbImage, debug: &'a mut DebugBuffer) -> Self {
        Self {
            frame_id,
            image,
            debug,
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// The pixel buffer of the current frame.
    pub fn image(&self) -> &'a RgbImage {
        self.image
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.is_enabled()
    }

    pub fn debug_picture(&mut self, description: impl Into<String>, image: DebugImage, hint: ColourHint) {
        self.debug.append(description, image, hint);
    }

    /// Shorthand for a `FrameProcessing` error about the current frame.
    pub fn frame_error(&self, reason: impl Into<String>) -> ProcessError {
        ProcessError::FrameProcessing {
            frame_id: self.frame_id,
            reason: reason.into(),
        }
    }
}

/// Owns one live strategy instance together with its debug buffer.
pub struct StrategyRunner {
    strategy: Box<dyn Strategy>,
    debug: DebugBuffer,
    current_frame: Option<u64>,
}

impl StrategyRunner {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy,
            debug: DebugBuffer::new(),
            current_frame: None,
        }
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    /// Identifier of the most recently processed frame.
    pub fn current_frame(&self) -> Option<u64> {
        self.current_frame
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug.set_enabled(enabled);
    }

    /// Runs the strategy on one frame and stamps its output with the frame's identity.
    pub fn process(&mut self, frame: &Frame) -> Result<Vec<Command>, ProcessError> {
        self.debug.clear();
        self.current_frame = Some(frame.id);

        if frame.width() == 0 || frame.height() == 0 {
            return Err(ProcessError::FrameProcessing {
                frame_id: frame.id,
                reason: "frame has no pixels".to_string(),
            });
        }

        let mut cycle = Cycle::new(frame.id, &frame.image, &mut self.debug);
        let payloads = self.strategy.handle(&mut cycle)?;

        Ok(payloads
            .into_iter()
            .map(|payload| Command::new(frame.id, payload, frame.metadata.clone()))
            .collect())
    }

    /// Takes the debug pictures of the last cycle, leaving the buffer empty.
    pub fn read_debug(&mut self) -> Vec<DebugEntry> {
        self.debug.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Emits one drive and one servo payload and records what it saw.
    struct Probe {
        seen: Vec<u64>,
    }

    impl Strategy for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn handle(&mut self, cycle: &mut Cycle<'_>) -> Result<Vec<Payload>, ProcessError> {
            self.seen.push(cycle.frame_id());
            if cycle.debug_enabled() {
                let raw = cycle.image().clone();
                cycle.debug_picture("raw", DebugImage::Rgb(raw), ColourHint::Rgb);
            }
            Ok(vec![Payload::drive(10, 20), Payload::servo(1, 90)])
        }
    }

    fn frame(id: u64) -> Frame {
        Frame::new(id, RgbImage::from_pixel(4, 3, Rgb([9, 9, 9]))).with_metadata("exposure", 5000)
    }

    #[test]
    fn every_command_carries_the_frame_identity() {
        let mut runner = StrategyRunner::new(Box::new(Probe { seen: Vec::new() }));
        let input = frame(42);
        let commands = runner.process(&input).unwrap();

        assert_eq!(commands.len(), 2);
        for command in &commands {
            assert_eq!(command.frame_id, 42);
            assert_eq!(command.metadata, input.metadata);
        }
        assert_eq!(runner.current_frame(), Some(42));
    }

    #[test]
    fn debug_pictures_only_collected_when_enabled() {
        let mut runner = StrategyRunner::new(Box::new(Probe { seen: Vec::new() }));
        runner.process(&frame(1)).unwrap();
        assert!(runner.read_debug().is_empty());

        runner.set_debug(true);
        runner.process(&frame(2)).unwrap();
        let entries = runner.read_debug();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "raw");
        assert!(runner.read_debug().is_empty());
    }

    #[test]
    fn stale_debug_pictures_are_cleared_before_each_cycle() {
        let mut runner = StrategyRunner::new(Box::new(Probe { seen: Vec::new() }));
        runner.set_debug(true);
        runner.process(&frame(1)).unwrap();
        runner.process(&frame(2)).unwrap();
        assert_eq!(runner.read_debug().len(), 1);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let mut runner = StrategyRunner::new(Box::new(Probe { seen: Vec::new() }));
        let empty = Frame::new(7, RgbImage::new(0, 0));
        assert!(matches!(
            runner.process(&empty),
            Err(ProcessError::FrameProcessing { frame_id: 7, .. })
        ));
    }
}
