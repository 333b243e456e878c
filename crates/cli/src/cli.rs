//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// framepipe - bounded-channel producer/worker/reassembly pipelines
#[derive(Parser, Debug)]
#[command(
    name = "framepipe",
    author,
    version,
    about = "Concurrent frame pipeline engine",
    long_about = "Runs either the live topology (sensor and camera producers feeding a \n\
                  fixed-rate render loop) or the batch topology (file reader, worker \n\
                  pool, in-order reassembly and a single ordered write)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FRAMEPIPE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FRAMEPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the live topology until Ctrl+C, a time limit or a fatal source error
    Live(LiveArgs),

    /// Run the batch topology over an input frame file
    Batch(BatchArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `live` command
#[derive(Parser, Debug, Clone)]
pub struct LiveArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults if absent
    #[arg(short, long, env = "FRAMEPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop after this many seconds (0 = until interrupted)
    #[arg(long, default_value = "0", env = "FRAMEPIPE_DURATION")]
    pub duration: u64,

    /// Stop after this many render ticks (0 = unlimited)
    #[arg(long, default_value = "0", env = "FRAMEPIPE_MAX_TICKS")]
    pub max_ticks: u64,

    /// Override the render rate from configuration
    #[arg(long, env = "FRAMEPIPE_TARGET_FPS")]
    pub target_fps: Option<u32>,

    /// Disable the camera channel
    #[arg(long)]
    pub no_camera: bool,

    /// Log the overlay line at info level every N ticks
    #[arg(long, default_value = "30")]
    pub log_every: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FRAMEPIPE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `batch` command
#[derive(Parser, Debug, Clone)]
pub struct BatchArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults if absent
    #[arg(short, long, env = "FRAMEPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override input frame file
    #[arg(short, long, env = "FRAMEPIPE_INPUT")]
    pub input: Option<PathBuf>,

    /// Override output path
    #[arg(short, long, env = "FRAMEPIPE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override worker count
    #[arg(short, long, env = "FRAMEPIPE_WORKERS")]
    pub workers: Option<usize>,

    /// Write the reassembled items even if some indices are missing
    #[arg(long)]
    pub allow_partial: bool,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FRAMEPIPE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "framepipe.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults if absent
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
