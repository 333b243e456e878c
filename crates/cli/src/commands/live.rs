//! `live` command implementation.

use std::time::Duration;

use anyhow::Result;
use contracts::{PipelineBlueprint, Signals};
use dispatcher::LogSink;
use pipeline::{LiveLimits, PipelineDriver};
use tracing::info;

use super::{drive, load_blueprint, revalidate, start_metrics};
use crate::cli::LiveArgs;

/// Execute the `live` command
pub async fn run_live(args: &LiveArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;

    if let Some(fps) = args.target_fps {
        info!(fps, "Overriding render rate from CLI");
        blueprint.live.target_fps = fps;
    }
    if args.no_camera {
        blueprint.live.camera_enabled = false;
    }
    revalidate(&blueprint)?;

    info!(
        sensors = blueprint.live.sensors.len(),
        camera = blueprint.live.camera_enabled,
        target_fps = blueprint.live.target_fps,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_live_summary(&blueprint);
        return Ok(());
    }

    start_metrics(args.metrics_port)?;

    let limits = LiveLimits {
        max_ticks: (args.max_ticks > 0).then_some(args.max_ticks),
        max_duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
    };
    let driver = PipelineDriver::new(blueprint, Signals::new());
    let signals = driver.signals().clone();
    let log_every = args.log_every.max(1);

    info!("Starting live pipeline...");
    let task = tokio::task::spawn_blocking(move || {
        let mut sink = LogSink::new("overlay").with_every(log_every);
        driver.run_live(&mut sink, limits)
    });
    let report = drive(task, &signals).await?;

    info!(
        ticks = report.ticks,
        duration_secs = report.duration.as_secs_f64(),
        fps = format!("{:.2}", report.fps()),
        "Live pipeline stopped"
    );
    println!("\n=== Live Run ===\n{report}\n");
    Ok(())
}

fn print_live_summary(blueprint: &PipelineBlueprint) {
    let live = &blueprint.live;
    println!("\n=== Live Configuration ===\n");
    println!("Render: {} fps", live.target_fps);
    println!(
        "Sensor channels: capacity {} ({:?})",
        live.sensor_queue_capacity, live.sensor_overflow
    );
    for sensor in &live.sensors {
        let limit = sensor
            .limit
            .map_or_else(|| "unbounded".to_string(), |n| format!("{n} readings"));
        println!("  - {} every {}ms, {}", sensor.id, sensor.delay_ms, limit);
    }
    if live.camera_enabled {
        let camera = &blueprint.camera;
        println!(
            "Camera: {:?} #{} {}x{} @ {} fps, capacity {} ({:?})",
            camera.device, camera.index, camera.width, camera.height, camera.fps,
            live.camera_queue_capacity, live.camera_overflow
        );
    } else {
        println!("Camera: disabled");
    }
    println!();
}
