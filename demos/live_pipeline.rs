//! Live Pipeline Example
//!
//! Three simulated sensors and a synthetic camera feed a 60 fps render loop
//! that logs the overlay line. Runs for five seconds, or pass a config path.
//!
//! Run with: cargo run -p demos --bin live_pipeline [config.toml]

use std::path::PathBuf;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::Signals;
use dispatcher::LogSink;
use observability::{init_with_config, LogFormat, ObservabilityConfig};
use pipeline::{LiveLimits, PipelineDriver};

fn main() -> anyhow::Result<()> {
    init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    tracing::info!("Starting Live Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = std::env::args().nth(1).map(PathBuf::from);
    let blueprint = ConfigLoader::load_or_default(config.as_deref())?;
    tracing::info!(
        sensors = blueprint.live.sensors.len(),
        camera = blueprint.live.camera_enabled,
        target_fps = blueprint.live.target_fps,
        "Blueprint ready"
    );

    // ==== Stage 2: Run until the time limit ====
    let driver = PipelineDriver::new(blueprint, Signals::new());
    let mut sink = LogSink::new("overlay").with_every(60);
    let report = driver.run_live(
        &mut sink,
        LiveLimits {
            max_ticks: None,
            max_duration: Some(Duration::from_secs(5)),
        },
    )?;

    // ==== Stage 3: Report ====
    println!("\n{report}");
    for channel in &report.channels {
        tracing::info!(
            source_id = %channel.source_id,
            last_produced = ?channel.last_produced,
            last_delivered = ?channel.last_delivered,
            evicted = channel.evicted,
            "channel finished"
        );
    }

    Ok(())
}
