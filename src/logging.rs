//! Logging setup for Shellac hosts.
//!
//! An interactive prompt shares the terminal with its own output, so hosts
//! normally log to a file and keep stderr for debugging and tests.

use std::fs::{self, File};
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::error::{Result, ShellacError};

const LOG_DIR_NAME: &str = "shellac";
const LOG_FILE_NAME: &str = "shellac.log";

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// A file, truncated when logging starts.
    File(PathBuf),
    /// Standard error.
    Stderr,
}

impl LogTarget {
    /// The log file under the platform state directory.
    pub fn default_file() -> Self {
        Self::File(get_log_path())
    }
}

/// Installs a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if the host already installed a subscriber.
pub fn init(target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    ShellacError::config(format!(
                        "Could not create log directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            let file = File::create(&path).map_err(|e| {
                ShellacError::config(format!("Could not create log file {}: {e}", path.display()))
            })?;
            builder.with_writer(file).with_ansi(false).try_init()
        }
    };

    if installed.is_err() {
        tracing::debug!("A tracing subscriber is already installed");
    }
    Ok(())
}

/// Returns the default log file path.
///
/// Prefers the state directory (`~/.local/state/shellac/shellac.log` on
/// Linux), then the config directory, then the temp directory.
pub fn get_log_path() -> PathBuf {
    [dirs::state_dir(), dirs::config_dir()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(LOG_DIR_NAME))
        .next()
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_FILE_NAME)
}
