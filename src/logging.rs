//! File logging for the command-line front end.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "jira_checkin=info";

/// Directory the daily log files are written to.
pub fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("jira-checkin").join("logs"))
}

/// Install the global subscriber. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "jira-checkin.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_ansi(false).with_writer(writer))
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}
