//! Command implementations.

mod batch;
mod info;
mod live;
mod validate;

pub use batch::run_batch;
pub use info::run_info;
pub use live::run_live;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, Signals};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::error::CliError;

/// Load the configuration file, or the built-in defaults when no path is given.
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<PipelineBlueprint> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(CliError::config_not_found(path.display().to_string()).into());
        }
        info!(config = %path.display(), "Loading configuration");
    } else {
        info!("No configuration file given, using defaults");
    }

    config_loader::ConfigLoader::load_or_default(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Default configuration is invalid".to_string(),
    })
}

/// Re-validate after CLI overrides were applied.
pub(crate) fn revalidate(blueprint: &PipelineBlueprint) -> Result<()> {
    config_loader::ConfigLoader::validate(blueprint)
        .context("Configuration invalid after applying command-line overrides")
}

/// Start the Prometheus exporter (0 = disabled).
pub(crate) fn start_metrics(port: u16) -> Result<()> {
    if port != 0 {
        observability::init_metrics_only(port)?;
    }
    Ok(())
}

/// Await a blocking pipeline run; Ctrl+C / SIGTERM requests a graceful stop
/// and the run is awaited again so every thread is joined before returning.
pub(crate) async fn drive<T: Send + 'static>(
    mut task: JoinHandle<pipeline::Result<T>>,
    signals: &Signals,
) -> Result<T> {
    tokio::select! {
        joined = &mut task => return finish(joined),
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, draining pipeline...");
            signals.request_stop();
        }
    }
    finish(task.await)
}

fn finish<T>(joined: std::result::Result<pipeline::Result<T>, JoinError>) -> Result<T> {
    let outcome = joined.map_err(|e| CliError::join(e.to_string()))?;
    outcome.map_err(|e| CliError::from(e).into())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
