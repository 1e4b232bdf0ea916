// The runner: replays a directory of frames through the control pipeline and
// logs the resulting commands. Usage: `lane_vision [config.yaml]`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lane_vision::config::AppConfig;
use lane_vision::io::{BackgroundExporter, CommandSink, DebugExporter, FrameSource, ImageDirSource, LogSink, PngExporter};
use lane_vision::{Control, ProcessError, StrategyRegistry};

const DEFAULT_CONFIG: &str = "lane_vision.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = if Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        AppConfig::default()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.runner.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(config = %config_path, strategy = %config.control.used, "lane_vision starting");

    let png = PngExporter::new(&config.runner.debug_dir);
    if config.runner.clear_debug_dir {
        let removed = png.clear().context("failed to clear the debug directory")?;
        info!(removed, dir = %png.dir().display(), "debug directory cleared");
    }

    let mut worker = None;
    let exporter: Box<dyn DebugExporter> = if config.runner.background_export {
        let (background, handle) = BackgroundExporter::spawn(Arc::new(png));
        worker = Some(handle);
        Box::new(background)
    } else {
        Box::new(png)
    };

    let registry = StrategyRegistry::from_configs(&config.strategies);
    let mut control = Control::new(config.control.clone(), registry, exporter)?;
    let mut source = ImageDirSource::open(&config.runner.input_dir)?;
    let mut sink = LogSink::new();
    info!(frames = source.remaining(), dir = %config.runner.input_dir.display(), "frame source ready");

    let mut skipped = 0u64;
    while let Some(frame) = source.next_frame()? {
        let commands = match control.process(&frame) {
            Ok(commands) => commands,
            Err(err @ ProcessError::FrameProcessing { .. }) => {
                warn!(frame_id = frame.id, error = %err, "frame skipped");
                skipped += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        for command in &commands {
            sink.handle_command(command)?;
        }
    }

    // Dropping the control closes the export queue; the worker drains it and exits.
    drop(control);
    if let Some(worker) = worker {
        worker.await.context("debug export worker failed")?;
    }

    info!(handled = sink.handled(), skipped, "lane_vision finished");
    Ok(())
}
