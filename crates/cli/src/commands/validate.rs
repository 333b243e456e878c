//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OverflowPolicy, PipelineBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    sensor_count: usize,
    camera_enabled: bool,
    target_fps: u32,
    workers: usize,
    transform: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    sensor_count: blueprint.live.sensors.len(),
                    camera_enabled: blueprint.live.camera_enabled,
                    target_fps: blueprint.live.target_fps,
                    workers: blueprint.batch.workers,
                    transform: format!("{:?}", blueprint.batch.transform),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues worth pointing out
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.live.sensor_overflow == OverflowPolicy::Block {
        warnings.push(
            "live.sensor_overflow is \"block\" - slow render ticks will stall sensor producers"
                .to_string(),
        );
    }

    if blueprint.live.camera_overflow == OverflowPolicy::Block && blueprint.live.camera_enabled {
        warnings.push(
            "live.camera_overflow is \"block\" - the render loop may show stale frames while capture waits"
                .to_string(),
        );
    }

    if blueprint.live.target_fps > blueprint.camera.fps.saturating_mul(4) && blueprint.live.camera_enabled {
        warnings.push(format!(
            "live.target_fps ({}) far exceeds camera.fps ({}) - most ticks will reuse the last frame",
            blueprint.live.target_fps, blueprint.camera.fps
        ));
    }

    if let Ok(cores) = std::thread::available_parallelism() {
        if blueprint.batch.workers > cores.get() * 4 {
            warnings.push(format!(
                "batch.workers ({}) is more than 4x the available cores ({})",
                blueprint.batch.workers, cores
            ));
        }
    }

    if !blueprint.batch.input_path.exists() {
        warnings.push(format!(
            "batch.input_path {} does not exist - the batch command will fail",
            blueprint.batch.input_path.display()
        ));
    }

    if blueprint.batch.allow_partial {
        warnings.push("batch.allow_partial is set - missing frames will not fail the run".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Sensors: {}", summary.sensor_count);
            println!("  Camera: {}", if summary.camera_enabled { "enabled" } else { "disabled" });
            println!("  Render rate: {} fps", summary.target_fps);
            println!("  Batch workers: {}", summary.workers);
            println!("  Transform: {}", summary.transform);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
