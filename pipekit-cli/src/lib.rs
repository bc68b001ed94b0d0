//! # pipekit-cli
//!
//! The two example drivers shipped as binaries:
//!
//! - `multidimensional-regression` ([`regression_example`])
//! - `anbc-example` ([`classification_example`])
//!
//! Neither takes arguments. File names and model settings come from the
//! layered configuration in [`pipekit_core::config`]. Progress goes to
//! stdout, diagnostics to the tracing subscriber installed by [`init_logging`].

pub mod classification_example;
pub mod regression_example;

use anyhow::Context;
use pipekit_core::{LoggingConfig, PipekitConfig, load_config};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the tracing subscriber: human-readable stderr, plus a JSON file
/// layer when `json_log_dir` is configured.
///
/// `RUST_LOG` takes precedence over the configured level. Keep the returned
/// guard alive until exit so buffered JSON lines are flushed.
pub fn init_logging(config: &LoggingConfig, workspace: &Path) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let mut guard = None;
    let json_layer = match &config.json_log_dir {
        Some(dir) => {
            let log_dir = workspace.join(dir);
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(&log_dir, "pipekit.log");
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()?;
    Ok(guard)
}

/// Resolve a configured path against the driver's working directory.
pub fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    workspace.join(path)
}

/// Shared `main` for both drivers: load `.env` and configuration, set up
/// logging, run the driver and map its outcome to an exit code.
///
/// Failures are printed to stdout as `ERROR: <step>: <cause>`.
pub fn run_main<F>(driver: F) -> ExitCode
where
    F: FnOnce(&PipekitConfig, &Path, &mut dyn Write) -> anyhow::Result<()>,
{
    let _ = dotenvy::dotenv();
    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config = match load_config(Some(&workspace)) {
        Ok(config) => config,
        Err(e) => {
            println!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&config.logging, &workspace) {
        Ok(guard) => guard,
        Err(e) => {
            println!("ERROR: Failed to initialise logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        driver(&config, &workspace, &mut out)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "driver failed");
            println!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}
