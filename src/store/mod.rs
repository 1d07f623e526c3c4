//! Change-tracked index store.
//!
//! [`IndexStore`] owns every persisted record: one [`DocumentRecord`] per
//! path plus a `files_meta` change-tracking row holding the last observed
//! mtime. Matching is delegated to a [`SearchBackend`] chosen when the store
//! is opened:
//!
//! | Mode | Table | Matching |
//! |------|-------|----------|
//! | [`BackendMode::Fts5`] | `cases_fts` (FTS5, porter stemming) | token/phrase `MATCH`, ranked |
//! | [`BackendMode::Substring`] | `cases` + index on `year` | case-insensitive `LIKE '%q%'`, insertion order |
//!
//! A new store probes SQLite for FTS5 support; an existing store keeps the
//! mode it was created with.

mod fts;
mod substring;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BackendPreference;
use crate::db;
use crate::models::DocumentRecord;

pub use fts::FtsBackend;
pub use substring::SubstringBackend;

/// Store-level failures callers may want to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no index found at {}", path.display())]
    NotFound { path: PathBuf },
    #[error("{} is not an initialized case index", path.display())]
    NotInitialized { path: PathBuf },
    #[error("FTS5 is not available in this SQLite build (index {})", path.display())]
    Unsupported { path: PathBuf },
    #[error("query must not be empty")]
    EmptyQuery,
}

/// Which matching strategy a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Fts5,
    Substring,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Fts5 => write!(f, "fts5"),
            BackendMode::Substring => write!(f, "substring"),
        }
    }
}

/// Document table operations that differ between backends.
///
/// Write methods take a connection so [`IndexStore`] can run them inside a
/// per-document transaction together with the change-tracking update.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    async fn create_schema(&self, conn: &mut SqliteConnection) -> Result<()>;

    /// Replaces any existing record for `record.path` with `record`.
    async fn replace(&self, conn: &mut SqliteConnection, record: &DocumentRecord) -> Result<()>;

    async fn remove(&self, conn: &mut SqliteConnection, path: &str) -> Result<()>;

    /// Records matching `text`, optionally restricted to an exact `year`.
    async fn query(
        &self,
        pool: &SqlitePool,
        text: &str,
        year: Option<&str>,
        limit: i64,
    ) -> Result<Vec<DocumentRecord>>;

    async fn records_for_path(&self, pool: &SqlitePool, path: &str)
        -> Result<Vec<DocumentRecord>>;

    /// Document counts grouped by year, sorted by year.
    async fn year_counts(&self, pool: &SqlitePool) -> Result<Vec<(String, i64)>>;
}

fn backend_for(mode: BackendMode) -> Arc<dyn SearchBackend> {
    match mode {
        BackendMode::Fts5 => Arc::new(FtsBackend),
        BackendMode::Substring => Arc::new(SubstringBackend),
    }
}

/// Summary of what a store holds.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub mode: BackendMode,
    pub documents: i64,
    pub tracked: i64,
    pub by_year: Vec<(String, i64)>,
}

/// Single-file SQLite index keyed by document path.
#[derive(Clone)]
pub struct IndexStore {
    pool: SqlitePool,
    backend: Arc<dyn SearchBackend>,
    location: PathBuf,
}

impl IndexStore {
    /// Opens the store at `location`, creating the file and schema if needed.
    ///
    /// `preference` only decides the backend of a brand-new store.
    pub async fn create(location: &Path, preference: BackendPreference) -> Result<Self> {
        let pool = db::connect(location, true).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files_meta (
                path TEXT PRIMARY KEY,
                mtime REAL NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .with_context(|| format!("Failed to initialize index at {}", location.display()))?;

        let mode = match detect_mode(&pool).await? {
            Some(existing) => {
                let conflicting = matches!(
                    (preference, existing),
                    (BackendPreference::Fts5, BackendMode::Substring)
                        | (BackendPreference::Substring, BackendMode::Fts5)
                );
                if conflicting {
                    tracing::warn!(
                        location = %location.display(),
                        mode = %existing,
                        "existing index keeps its backend; ignoring configured preference"
                    );
                }
                existing
            }
            None => match preference {
                BackendPreference::Substring => BackendMode::Substring,
                BackendPreference::Auto => {
                    if supports_fts5(&pool).await {
                        BackendMode::Fts5
                    } else {
                        BackendMode::Substring
                    }
                }
                BackendPreference::Fts5 => {
                    if !supports_fts5(&pool).await {
                        pool.close().await;
                        return Err(StoreError::Unsupported {
                            path: location.to_path_buf(),
                        }
                        .into());
                    }
                    BackendMode::Fts5
                }
            },
        };

        let backend = backend_for(mode);
        let mut conn = pool.acquire().await?;
        backend.create_schema(&mut *conn).await?;
        drop(conn);

        tracing::debug!(location = %location.display(), %mode, "index store ready");
        Ok(Self {
            pool,
            backend,
            location: location.to_path_buf(),
        })
    }

    /// Opens a store that must already exist and be initialized.
    pub async fn open_existing(location: &Path) -> Result<Self> {
        if !location.is_file() {
            return Err(StoreError::NotFound {
                path: location.to_path_buf(),
            }
            .into());
        }

        let pool = db::connect(location, false).await?;
        let mode = match detect_mode(&pool).await? {
            Some(mode) => mode,
            None => {
                pool.close().await;
                return Err(StoreError::NotInitialized {
                    path: location.to_path_buf(),
                }
                .into());
            }
        };

        Ok(Self {
            pool,
            backend: backend_for(mode),
            location: location.to_path_buf(),
        })
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Inserts `record`, replacing whatever was stored for its path.
    pub async fn upsert(&self, record: &DocumentRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.backend.replace(&mut *tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes the document and its change-tracking row.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.backend.remove(&mut *tx, path).await?;
        sqlx::query("DELETE FROM files_meta WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Last recorded mtime for `path`, if it was ever processed.
    pub async fn get_mtime(&self, path: &str) -> Result<Option<f64>> {
        let mtime: Option<f64> = sqlx::query_scalar("SELECT mtime FROM files_meta WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mtime)
    }

    pub async fn set_mtime(&self, path: &str, mtime: f64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_mtime(&mut *conn, path, mtime).await
    }

    /// Writes the document and its new mtime as one transaction.
    pub async fn commit(&self, record: &DocumentRecord, mtime: f64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.backend.replace(&mut *tx, record).await?;
        upsert_mtime(&mut *tx, &record.path, mtime).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Matches `text` against stored documents, at most `limit` rows.
    pub async fn query(
        &self,
        text: &str,
        year: Option<&str>,
        limit: i64,
    ) -> Result<Vec<DocumentRecord>> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyQuery.into());
        }
        self.backend
            .query(&self.pool, text, year, limit.max(1))
            .await
            .with_context(|| format!("Query failed against {}", self.location.display()))
    }

    pub async fn records_for_path(&self, path: &str) -> Result<Vec<DocumentRecord>> {
        self.backend.records_for_path(&self.pool, path).await
    }

    /// Every path with a change-tracking row, sorted.
    pub async fn tracked_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM files_meta ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let by_year = self.backend.year_counts(&self.pool).await?;
        let documents = by_year.iter().map(|(_, n)| n).sum();
        let tracked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files_meta")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats {
            mode: self.mode(),
            documents,
            tracked,
            by_year,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn upsert_mtime(conn: &mut SqliteConnection, path: &str, mtime: f64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO files_meta (path, mtime) VALUES (?, ?)
        ON CONFLICT(path) DO UPDATE SET mtime = excluded.mtime
        "#,
    )
    .bind(path)
    .bind(mtime)
    .execute(conn)
    .await?;
    Ok(())
}

fn record_from_row(row: &SqliteRow) -> DocumentRecord {
    DocumentRecord {
        path: row.get("path"),
        case_name: row.get("case_name"),
        year: row.get("year"),
        content: row.get("content"),
    }
}

/// Mode of an already-initialized store, from the tables it contains.
async fn detect_mode(pool: &SqlitePool) -> Result<Option<BackendMode>> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('cases_fts', 'cases')",
    )
    .fetch_all(pool)
    .await?;

    if tables.iter().any(|t| t == "cases_fts") {
        Ok(Some(BackendMode::Fts5))
    } else if tables.iter().any(|t| t == "cases") {
        Ok(Some(BackendMode::Substring))
    } else {
        Ok(None)
    }
}

/// Probes FTS5 by creating and dropping a scratch table in the temp schema.
async fn supports_fts5(pool: &SqlitePool) -> bool {
    let Ok(mut conn) = pool.acquire().await else {
        return false;
    };
    let created = sqlx::query("CREATE VIRTUAL TABLE temp.__fts_probe USING fts5(content)")
        .execute(&mut *conn)
        .await
        .is_ok();
    if created {
        let _ = sqlx::query("DROP TABLE temp.__fts_probe")
            .execute(&mut *conn)
            .await;
    }
    created
}
