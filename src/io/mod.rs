// THEORY:
// The pipeline core never touches hardware, the file system or the network.
// It talks to the outside world through three contracts, each a trait:
//
// 1.  `FrameSource`: hands out frames with strictly increasing identifiers.
// 2.  `CommandSink`: consumes the commands a cycle produced.
// 3.  `DebugExporter`: persists a debug picture under `{frame_id}_{description}`.
//
// The implementations here are the ones the runner binary uses: frames from a
// directory of image files, commands to the log, debug pictures to PNG files,
// optionally off the control thread.

pub mod exporter;
pub mod sink;
pub mod source;

pub use exporter::{BackgroundExporter, DebugExporter, PngExporter};
pub use sink::{CommandSink, LogSink};
pub use source::{FrameSource, ImageDirSource};
