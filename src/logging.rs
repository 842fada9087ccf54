//! Log to a file so stdout only carries rendered Markdown.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `jira_notes=debug`.
pub const LOG_ENV: &str = "JIRA_NOTES_LOG";
const LOG_FILE: &str = "jira-notes.log";

/// Directory holding the log file.
pub fn log_dir() -> Option<PathBuf> {
  dirs::data_dir().map(|dir| dir.join("jira-notes"))
}

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines get flushed.
pub fn init() -> Result<WorkerGuard> {
  let dir = log_dir().ok_or_else(|| eyre!("Could not determine the data directory"))?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
