//! Command-line arguments for the demo shell.

use shellac::config::{Config, StorageBackend};
use clap::Parser;
use std::path::PathBuf;

/// An interactive shell built on Shellac.
#[derive(Parser, Debug)]
#[command(name = "shellac")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Persist history under this identifier
    #[arg(long, value_name = "ID", env = "SHELLAC_HISTORY_ID")]
    pub history_id: Option<String>,

    /// Store history in a SQLite database at this path
    #[arg(long, value_name = "PATH")]
    pub history_db: Option<PathBuf>,

    /// Prompt delimiter
    #[arg(short, long, value_name = "TEXT")]
    pub delimiter: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,

    /// Execute these lines, then exit
    #[arg(short = 'e', long = "exec", value_name = "LINE")]
    pub exec: Vec<String>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides on top of file configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(id) = &self.history_id {
            config.history.id = Some(id.clone());
        }
        if let Some(path) = &self.history_db {
            config.history.storage = StorageBackend::Sqlite;
            config.history.path = Some(path.clone());
        }
        if let Some(delimiter) = &self.delimiter {
            config.session.delimiter = delimiter.clone();
        }
    }

    /// Returns true when lines were given on the command line.
    pub fn is_batch(&self) -> bool {
        !self.exec.is_empty()
    }
}
