//! CLI command implementations

pub mod demo;
pub mod logs;
pub mod run;
pub mod status;
pub mod sweep;

use std::path::PathBuf;

use anyhow::{Context, Result};
use sisyphus_core::services::{EntryPoint, LogEvent, LoggingService};
use sisyphus_core::SisyphusContext;

/// Get the event log for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(entry_point: EntryPoint) -> Option<LoggingService> {
    let sisyphus_dir = get_sisyphus_dir();
    std::fs::create_dir_all(&sisyphus_dir).ok()?;
    match LoggingService::new(&sisyphus_dir, entry_point, env!("CARGO_PKG_VERSION")) {
        Ok(logger) => Some(logger),
        Err(e) => {
            tracing::warn!(error = %e, "event log unavailable");
            None
        }
    }
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::warn!(error = %e, "failed to write event log");
        }
    }
}

/// Get the data directory from SISYPHUS_DIR or default to ~/.sisyphus
pub fn get_sisyphus_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SISYPHUS_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sisyphus")
    }
}

/// Get or create the sisyphus context
pub fn get_context() -> Result<SisyphusContext> {
    let sisyphus_dir = get_sisyphus_dir();

    std::fs::create_dir_all(&sisyphus_dir)
        .with_context(|| format!("Failed to create sisyphus directory: {:?}", sisyphus_dir))?;

    SisyphusContext::new(&sisyphus_dir).context("Failed to initialize sisyphus context")
}
