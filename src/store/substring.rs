//! Fallback backend for SQLite builds without FTS5.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{record_from_row, BackendMode, SearchBackend};
use crate::models::DocumentRecord;

/// Plain table with a unique `path` and an index on `year`. Matching is a
/// case-insensitive substring test on `content` (ASCII case folding, as
/// SQLite's `LIKE` does); results come back in insertion order.
pub struct SubstringBackend;

#[async_trait]
impl SearchBackend for SubstringBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Substring
    }

    async fn create_schema(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                id INTEGER PRIMARY KEY,
                case_name TEXT NOT NULL,
                year TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_year ON cases(year)")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn replace(&self, conn: &mut SqliteConnection, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO cases (case_name, year, path, content) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.case_name)
        .bind(&record.year)
        .bind(&record.path)
        .bind(&record.content)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM cases WHERE path = ?")
            .bind(path)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        pool: &SqlitePool,
        text: &str,
        year: Option<&str>,
        limit: i64,
    ) -> Result<Vec<DocumentRecord>> {
        let pattern = format!("%{}%", escape_like(text.trim()));
        let rows = match year {
            Some(year) => {
                sqlx::query(
                    r#"
                    SELECT case_name, year, path, content
                    FROM cases
                    WHERE year = ? AND content LIKE ? ESCAPE '\'
                    ORDER BY id
                    LIMIT ?
                    "#,
                )
                .bind(year)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT case_name, year, path, content
                    FROM cases
                    WHERE content LIKE ? ESCAPE '\'
                    ORDER BY id
                    LIMIT ?
                    "#,
                )
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn records_for_path(
        &self,
        pool: &SqlitePool,
        path: &str,
    ) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query("SELECT case_name, year, path, content FROM cases WHERE path = ?")
            .bind(path)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn year_counts(&self, pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT year, COUNT(*) AS n FROM cases GROUP BY year ORDER BY year")
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(|r| (r.get("year"), r.get("n"))).collect())
    }
}

/// Escapes `LIKE` wildcards so the query is matched literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
