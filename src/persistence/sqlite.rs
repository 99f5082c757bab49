//! SQLite-backed key-value store.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use super::migrations;
use super::KeyValueStore;
use crate::error::{Result, ShellacError};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// Key-value store in a local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Returns the default database path for the current platform.
    ///
    /// - Linux: `~/.local/share/shellac/history.db`
    /// - macOS: `~/Library/Application Support/shellac/history.db`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| ShellacError::persistence("Could not determine data directory"))?;
        Ok(data_dir.join("shellac").join("history.db"))
    }

    /// Opens or creates the database at `path`.
    ///
    /// A database that cannot be opened is moved aside and recreated.
    pub async fn open(path: &Path) -> Result<Self> {
        ensure_parent_dirs(path)?;

        match Self::try_open(path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!("Failed to open history database: {e}. Attempting recovery...");
                Self::attempt_recovery(path).await
            }
        }
    }

    /// Attempts to open the database with retries for lock contention.
    async fn try_open(path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * 2u64.pow(attempt)))
                    .await;
            }

            match connect(path).await {
                Ok(pool) => {
                    migrations::run_migrations(&pool).await?;
                    info!("History database opened at {}", path.display());
                    return Ok(Self {
                        pool,
                        db_path: path.to_path_buf(),
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ShellacError::persistence("Failed to open database after retries")))
    }

    async fn attempt_recovery(path: &Path) -> Result<Self> {
        let backup_path = path.with_extension("db.bak");

        if path.exists() {
            std::fs::rename(path, &backup_path).map_err(|e| {
                ShellacError::persistence(format!(
                    "Failed to back up corrupted database to {}: {e}",
                    backup_path.display()
                ))
            })?;
            warn!("Backed up corrupted database to {}", backup_path.display());
        }

        Self::try_open(path).await.map_err(|e| {
            ShellacError::persistence(format!("Failed to recreate database after backup: {e}"))
        })
    }

    /// Returns the database path.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn connect(path: &Path) -> Result<SqlitePool> {
    let conn_str = format!("sqlite:{}?mode=rwc", path.display());
    let options = SqliteConnectOptions::from_str(&conn_str)
        .map_err(|e| ShellacError::persistence(format!("Invalid database path: {e}")))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .map_err(|e| ShellacError::persistence(format!("Failed to connect to history database: {e}")))
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ShellacError::persistence(format!(
                "Failed to create data directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ShellacError::persistence(format!("Failed to read key {key}: {e}")))?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| ShellacError::persistence(format!("Failed to write key {key}: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| ShellacError::persistence(format!("Failed to remove key {key}: {e}")))?;
        Ok(())
    }
}
