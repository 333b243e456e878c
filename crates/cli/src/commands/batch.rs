//! `batch` command implementation.

use anyhow::Result;
use contracts::{PipelineBlueprint, Signals};
use dispatcher::FileSink;
use pipeline::PipelineDriver;
use tracing::{info, warn};

use super::{drive, load_blueprint, revalidate, start_metrics};
use crate::cli::BatchArgs;

/// Execute the `batch` command
pub async fn run_batch(args: &BatchArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args);
    revalidate(&blueprint)?;

    let batch = &blueprint.batch;
    info!(
        input = %batch.input_path.display(),
        output = %batch.output_path.display(),
        workers = batch.workers,
        transform = ?batch.transform,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_batch_summary(&blueprint);
        return Ok(());
    }

    start_metrics(args.metrics_port)?;

    let mut sink = FileSink::from_config(&blueprint.batch);
    let driver = PipelineDriver::new(blueprint, Signals::new());
    let signals = driver.signals().clone();

    info!("Starting batch pipeline...");
    let task = tokio::task::spawn_blocking(move || driver.run_batch(&mut sink));
    let report = drive(task, &signals).await?;

    if !report.is_complete() {
        warn!(
            missing = report.missing.len(),
            "Partial output written, some frames are missing"
        );
    }
    println!("\n=== Batch Run ===\n{report}\n");
    Ok(())
}

fn apply_overrides(blueprint: &mut PipelineBlueprint, args: &BatchArgs) {
    let batch = &mut blueprint.batch;
    if let Some(ref input) = args.input {
        info!(input = %input.display(), "Overriding input path from CLI");
        batch.input_path = input.clone();
    }
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output path from CLI");
        batch.output_path = output.clone();
    }
    if let Some(workers) = args.workers {
        batch.workers = workers;
    }
    if args.allow_partial {
        batch.allow_partial = true;
    }
}

fn print_batch_summary(blueprint: &PipelineBlueprint) {
    let batch = &blueprint.batch;
    println!("\n=== Batch Configuration ===\n");
    println!("Input: {}", batch.input_path.display());
    println!(
        "Frame: {}x{} RGB24 ({} bytes)",
        blueprint.camera.width,
        blueprint.camera.height,
        blueprint.camera.frame_bytes()
    );
    println!("Output: {} ({:?})", batch.output_path.display(), batch.output_format);
    println!("Transform: {:?}", batch.transform);
    println!("Workers: {}", batch.workers);
    println!(
        "Queues: input {}, results {}",
        batch.input_queue_capacity, batch.result_queue_capacity
    );
    println!("Failure policy: {:?}", batch.failure_policy);
    println!("Allow partial: {}", batch.allow_partial);
    println!();
}
