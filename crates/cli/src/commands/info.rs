//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    live: LiveInfo,
    batch: BatchInfo,
    runtime: RuntimeInfo,
}

#[derive(Serialize)]
struct LiveInfo {
    target_fps: u32,
    tick_interval_ms: f64,
    sensor_overflow: String,
    camera_overflow: String,
    sensors: Vec<SensorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<CameraInfo>,
}

#[derive(Serialize)]
struct SensorInfo {
    id: String,
    delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

#[derive(Serialize)]
struct CameraInfo {
    device: String,
    device_path: String,
    width: u32,
    height: u32,
    fps: u32,
    frame_bytes: usize,
}

#[derive(Serialize)]
struct BatchInfo {
    input_path: String,
    output_path: String,
    output_format: String,
    transform: String,
    workers: usize,
    input_queue_capacity: usize,
    result_queue_capacity: usize,
    failure_policy: String,
    allow_partial: bool,
}

#[derive(Serialize)]
struct RuntimeInfo {
    pop_timeout_ms: u64,
    poll_interval_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = load_blueprint(args.config.as_deref())?;
    info!("Loaded configuration info");

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint) -> ConfigInfo {
    let live = &blueprint.live;
    let camera = &blueprint.camera;
    let batch = &blueprint.batch;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        live: LiveInfo {
            target_fps: live.target_fps,
            tick_interval_ms: live.tick_interval().as_secs_f64() * 1000.0,
            sensor_overflow: format!("{:?}", live.sensor_overflow),
            camera_overflow: format!("{:?}", live.camera_overflow),
            sensors: live
                .sensors
                .iter()
                .map(|s| SensorInfo {
                    id: s.id.clone(),
                    delay_ms: s.delay_ms,
                    limit: s.limit,
                })
                .collect(),
            camera: live.camera_enabled.then(|| CameraInfo {
                device: format!("{:?}", camera.device),
                device_path: camera.resolved_device_path().display().to_string(),
                width: camera.width,
                height: camera.height,
                fps: camera.fps,
                frame_bytes: camera.frame_bytes(),
            }),
        },
        batch: BatchInfo {
            input_path: batch.input_path.display().to_string(),
            output_path: batch.output_path.display().to_string(),
            output_format: format!("{:?}", batch.output_format),
            transform: format!("{:?}", batch.transform),
            workers: batch.workers,
            input_queue_capacity: batch.input_queue_capacity,
            result_queue_capacity: batch.result_queue_capacity,
            failure_policy: format!("{:?}", batch.failure_policy),
            allow_partial: batch.allow_partial,
        },
        runtime: RuntimeInfo {
            pop_timeout_ms: blueprint.runtime.pop_timeout_ms,
            poll_interval_ms: blueprint.runtime.poll_interval_ms,
        },
    }
}

fn print_config_info(blueprint: &PipelineBlueprint) {
    let live = &blueprint.live;
    let camera = &blueprint.camera;
    let batch = &blueprint.batch;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 framepipe Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Live ({:?})", blueprint.version);
    println!(
        "   ├─ Render: {} fps ({:.2} ms/tick)",
        live.target_fps,
        live.tick_interval().as_secs_f64() * 1000.0
    );
    println!(
        "   ├─ Sensor channels: capacity {} ({:?})",
        live.sensor_queue_capacity, live.sensor_overflow
    );
    for sensor in &live.sensors {
        println!("   │   ├─ {} ({} ms)", sensor.id, sensor.delay_ms);
    }
    if live.camera_enabled {
        println!(
            "   └─ Camera: {:?} {} {}x{} @ {} fps",
            camera.device,
            camera.resolved_device_path().display(),
            camera.width,
            camera.height,
            camera.fps
        );
    } else {
        println!("   └─ Camera: disabled");
    }

    println!("\n🗂  Batch");
    println!("   ├─ Input: {}", batch.input_path.display());
    println!(
        "   ├─ Output: {} ({:?})",
        batch.output_path.display(),
        batch.output_format
    );
    println!("   ├─ Transform: {:?}", batch.transform);
    println!("   ├─ Workers: {}", batch.workers);
    println!("   ├─ Failure policy: {:?}", batch.failure_policy);
    println!("   └─ Allow partial: {}", batch.allow_partial);

    println!("\n⚙️  Runtime");
    println!("   ├─ Pop timeout: {} ms", blueprint.runtime.pop_timeout_ms);
    println!("   └─ Poll interval: {} ms", blueprint.runtime.poll_interval_ms);

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_omits_disabled_camera() {
        let mut blueprint = PipelineBlueprint::default();
        blueprint.live.camera_enabled = false;

        let info = build_config_info(&blueprint);
        assert!(info.live.camera.is_none());
        assert_eq!(info.live.sensors.len(), 3);

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["live"].get("camera").is_none());
        assert_eq!(json["batch"]["workers"], blueprint.batch.workers);
    }
}
