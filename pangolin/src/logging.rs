//! Process-wide tracing setup.
//!
//! Interactive commands log to stderr. A foreground client run with a log file
//! writes to that file instead, after rotating it; the returned guard must live
//! until the process exits so buffered lines are flushed.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{PersistedConfig, resolve_log_level};
use crate::output;
use crate::supervisor::{LogFile, LogFileError};

pub fn init(cli: &Cli) -> Result<Option<WorkerGuard>, LogFileError> {
    if let Some(args) = cli.foreground_client()
        && let Some(path) = &args.log_file
    {
        let prepared = LogFile::new(path).prepare()?;
        if let Some(e) = &prepared.rotation_error {
            output::warning(&format!("Failed to rotate log file: {e}"));
        }

        let config = PersistedConfig::load().unwrap_or_default();
        let level = resolve_log_level(args.log_level.as_deref(), &config);
        let (writer, guard) = tracing_appender::non_blocking(prepared.file);
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(&level)),
            )
            .with_writer(writer)
            .with_ansi(false)
            .init();

        if let Some(e) = prepared.rotation_error {
            tracing::warn!(error = %e, "log rotation failed, continuing in current file");
        }
        tracing::info!(path = %prepared.path.display(), "logging to file");
        if let Some(rotated) = prepared.rotated_to {
            tracing::info!(rotated = %rotated.display(), "rotated previous log file");
        }
        return Ok(Some(guard));
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cli.verbose {
                EnvFilter::new("info")
            } else {
                EnvFilter::new("warn")
            }
        }))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(None)
}

/// Filter for a client log level name. Unknown names fall back to `info`.
fn level_filter(level: &str) -> EnvFilter {
    let directive = match level.trim().to_ascii_lowercase().as_str() {
        "fatal" | "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    EnvFilter::new(directive)
}
