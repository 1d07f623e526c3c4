//! Document retrieval by path.
//!
//! Fetches the stored record and change-tracking mtime for one document.
//! Used by the `casefind get` CLI command.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::Config;
use crate::store::IndexStore;

/// Everything the store knows about one path.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub path: String,
    pub case_name: String,
    pub year: String,
    /// Last indexed mtime as ISO8601, when recorded.
    pub indexed_mtime: Option<String>,
    pub content: String,
}

/// Core get function returning structured data.
pub async fn get_document(store: &IndexStore, path: &str) -> Result<DocumentResponse> {
    let mut records = store.records_for_path(path).await?;
    let Some(record) = records.pop() else {
        bail!("document not found: {}", path);
    };
    let mtime = store.get_mtime(path).await?;

    Ok(DocumentResponse {
        path: record.path,
        case_name: record.case_name,
        year: record.year,
        indexed_mtime: mtime.map(format_mtime_iso),
        content: record.content,
    })
}

/// Maps a user-supplied path to the key it was indexed under.
///
/// Existing files resolve to their canonical absolute path; anything else
/// (a file deleted since indexing, say) is looked up verbatim.
pub fn index_key(path: &str) -> String {
    std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string())
}

/// CLI entry point: calls get_document and prints to stdout.
pub async fn run_get(config: &Config, path: &str) -> Result<()> {
    let store = IndexStore::open_existing(&config.db.path).await?;
    let doc = get_document(&store, &index_key(path)).await;
    store.close().await;
    let doc = doc?;

    println!("--- Document ---");
    println!("path:      {}", doc.path);
    println!("case:      {}", doc.case_name);
    println!("year:      {}", doc.year);
    println!(
        "mtime:     {}",
        doc.indexed_mtime.as_deref().unwrap_or("(not recorded)")
    );
    println!("chars:     {}", doc.content.chars().count());
    println!();

    println!("--- Content ---");
    if doc.content.is_empty() {
        println!("(no text extracted)");
    } else {
        println!("{}", doc.content);
    }

    Ok(())
}

fn format_mtime_iso(mtime: f64) -> String {
    chrono::DateTime::from_timestamp(mtime.floor() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| mtime.to_string())
}
