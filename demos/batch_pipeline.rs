//! Batch Pipeline Example
//!
//! Writes a short synthetic clip of raw RGB24 frames to a scratch directory,
//! then runs it through reader → worker pool (grayscale) → reassembly → PNG
//! sequence.
//!
//! Run with: cargo run -p demos --bin batch_pipeline [frames] [workers]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use contracts::{OutputFormat, PipelineBlueprint, Signals, TransformKind};
use dispatcher::FileSink;
use observability::{init_with_config, LogFormat, ObservabilityConfig};
use pipeline::PipelineDriver;
use sources::synthetic_pattern;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn main() -> anyhow::Result<()> {
    init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    let mut args = std::env::args().skip(1);
    let frames: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(120);
    let workers: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(4);

    // ==== Stage 1: Generate input clip ====
    let scratch = std::env::temp_dir().join("framepipe-demo");
    std::fs::create_dir_all(&scratch)?;
    let input = scratch.join("clip.rgb");
    write_clip(&input, frames)?;
    tracing::info!(path = %input.display(), frames, "Synthetic clip written");

    // ==== Stage 2: Blueprint ====
    let mut blueprint = PipelineBlueprint::default();
    blueprint.camera.width = WIDTH;
    blueprint.camera.height = HEIGHT;
    blueprint.batch.input_path = input;
    blueprint.batch.output_path = scratch.join("frames");
    blueprint.batch.output_format = OutputFormat::PngSequence;
    blueprint.batch.transform = TransformKind::Grayscale;
    blueprint.batch.workers = workers;
    config_loader::ConfigLoader::validate(&blueprint)?;

    // ==== Stage 3: Run ====
    let mut sink = FileSink::from_config(&blueprint.batch);
    let driver = PipelineDriver::new(blueprint, Signals::new());
    let report = driver.run_batch(&mut sink)?;

    println!("\n{report}");
    println!("Output: {}", sink.path().display());
    Ok(())
}

fn write_clip(path: &Path, frames: u64) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for phase in 0..frames {
        out.write_all(&synthetic_pattern(WIDTH, HEIGHT, phase).data)?;
    }
    out.flush()
}
