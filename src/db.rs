use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Opens a connection pool on the single-file store at `db_path`.
///
/// With `create` set the file (and its parent directory) is created when
/// missing and switched to WAL; otherwise a missing file is an error from
/// SQLite and the journal mode is left as found.
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory {}", parent.display())
                })?;
            }
        }
    }

    let mut options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create);
    // Read-only commands leave the file's journal mode alone.
    if create {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open index at {}", db_path.display()))?;

    Ok(pool)
}
