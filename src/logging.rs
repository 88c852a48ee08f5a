//! Tracing setup for the binary.
//!
//! Console output goes to stderr so stdout stays clean for `status --json`.
//! `RUST_LOG` overrides the console level. The publishing process additionally
//! logs everything at debug level into the job folder.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Install the global subscriber.
///
/// With `job_log`, records are also appended to that file through a
/// background writer; keep the returned guard alive until exit or buffered
/// lines are lost.
pub fn init(console_level: LevelFilter, job_log: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let mut guard = None;
    let file = match job_log {
        Some(path) => {
            let (writer, g) = file_writer(path)?;
            guard = Some(g);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Console level for the given flags: `--verbose` wins, then the command's default.
pub fn console_level(verbose: bool, default: LevelFilter) -> LevelFilter {
    if verbose { LevelFilter::DEBUG } else { default }
}
