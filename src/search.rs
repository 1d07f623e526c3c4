//! Query engine: keyword search with an optional exact year filter.
//!
//! Matching and ordering are delegated entirely to the store backend. Each
//! returned record gets a display snippet centered on the first
//! case-insensitive occurrence of the query, with the match wrapped in
//! [`HIGHLIGHT_OPEN`] / [`HIGHLIGHT_CLOSE`].

use anyhow::Result;

use crate::config::Config;
use crate::models::QueryResult;
use crate::store::IndexStore;

pub const HIGHLIGHT_OPEN: &str = "<<";
pub const HIGHLIGHT_CLOSE: &str = ">>";

/// Searches `store` and builds one [`QueryResult`] per matching document,
/// in the order the backend returned them.
///
/// An empty query is rejected by the store; zero matches is `Ok(vec![])`.
pub async fn search(
    store: &IndexStore,
    query: &str,
    year: Option<&str>,
    limit: i64,
    window: usize,
) -> Result<Vec<QueryResult>> {
    let records = store.query(query, year, limit).await?;
    let query = query.trim();

    Ok(records
        .into_iter()
        .map(|r| QueryResult {
            snippet: highlight_snippet(&r.content, query, window),
            case_name: r.case_name,
            year: r.year,
            path: r.path,
        })
        .collect())
}

/// Builds a display excerpt of at most `window` characters of `content`.
///
/// When `query` occurs (case-insensitively), the excerpt spans half a
/// window either side of the match start and the match is wrapped in
/// highlight markers. Otherwise the excerpt is the start of `content`.
/// Newlines become spaces; the result is trimmed.
pub fn highlight_snippet(content: &str, query: &str, window: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    let needle: Vec<char> = query.chars().collect();

    let Some(idx) = find_ci(&chars, &needle) else {
        let end = window.min(chars.len());
        return flatten(&chars[..end]).trim().to_string();
    };

    let half = window / 2;
    let start = idx.saturating_sub(half);
    let end = (idx + half).min(chars.len());
    let excerpt = &chars[start..end];

    // The match may be cut off by the window edge; then show it unmarked.
    let Some(rel) = find_ci(excerpt, &needle) else {
        return flatten(excerpt).trim().to_string();
    };
    let match_end = rel + needle.len();
    format!(
        "{}{}{}{}{}",
        flatten(&excerpt[..rel]),
        HIGHLIGHT_OPEN,
        flatten(&excerpt[rel..match_end]),
        HIGHLIGHT_CLOSE,
        flatten(&excerpt[match_end..])
    )
    .trim()
    .to_string()
}

/// First index where `needle` matches `haystack`, comparing characters by
/// their lowercase forms. Indices are in characters, not bytes.
fn find_ci(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })
}

fn flatten(chars: &[char]) -> String {
    chars
        .iter()
        .map(|&c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// CLI entry point for `casefind search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    year: Option<&str>,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let store = IndexStore::open_existing(&config.db.path).await?;
    let limit = limit.unwrap_or(config.search.limit);
    let results = search(&store, query, year, limit, config.search.snippet_window).await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    for r in &results {
        println!("Year: {} | Case: {} | File: {}", r.year, r.case_name, r.path);
        println!("  ...{}...", r.snippet);
        println!();
    }
    Ok(())
}
