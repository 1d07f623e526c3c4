//! FTS5 backend: one virtual table over all four record columns.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{record_from_row, BackendMode, SearchBackend};
use crate::models::DocumentRecord;

/// Full-text backend with porter stemming and native `rank` ordering.
///
/// FTS5 tables have no unique constraint, so `replace` deletes by path
/// before inserting.
pub struct FtsBackend;

#[async_trait]
impl SearchBackend for FtsBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Fts5
    }

    async fn create_schema(&self, conn: &mut SqliteConnection) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'cases_fts'",
        )
        .fetch_one(&mut *conn)
        .await?;

        if !exists {
            sqlx::query(
                r#"
                CREATE VIRTUAL TABLE cases_fts USING fts5(
                    case_name,
                    year,
                    path,
                    content,
                    tokenize = 'porter'
                )
                "#,
            )
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn replace(&self, conn: &mut SqliteConnection, record: &DocumentRecord) -> Result<()> {
        self.remove(&mut *conn, &record.path).await?;
        sqlx::query("INSERT INTO cases_fts (case_name, year, path, content) VALUES (?, ?, ?, ?)")
            .bind(&record.case_name)
            .bind(&record.year)
            .bind(&record.path)
            .bind(&record.content)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM cases_fts WHERE path = ?")
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
        let phrase = phrase_query(text);
        let rows = match year {
            Some(year) => {
                sqlx::query(
                    r#"
                    SELECT case_name, year, path, content
                    FROM cases_fts
                    WHERE cases_fts MATCH ? AND year = ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(&phrase)
                .bind(year)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT case_name, year, path, content
                    FROM cases_fts
                    WHERE cases_fts MATCH ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(&phrase)
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
        let rows =
            sqlx::query("SELECT case_name, year, path, content FROM cases_fts WHERE path = ?")
                .bind(path)
                .fetch_all(pool)
                .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn year_counts(&self, pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT year, COUNT(*) AS n FROM cases_fts GROUP BY year ORDER BY year",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.iter().map(|r| (r.get("year"), r.get("n"))).collect())
    }
}

/// Quotes user input as a single FTS5 phrase so operators and punctuation
/// are never parsed as query syntax.
fn phrase_query(text: &str) -> String {
    format!("\"{}\"", text.trim().replace('"', "\"\""))
}
