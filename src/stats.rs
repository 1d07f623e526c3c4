//! Index statistics.
//!
//! A quick summary of what's indexed: backend mode, document and tracked
//! file counts, and a per-year breakdown. Used by `casefind stats`.

use anyhow::Result;

use crate::config::Config;
use crate::store::IndexStore;

/// Run the stats command: open the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = IndexStore::open_existing(&config.db.path).await?;
    let stats = store.stats().await?;
    store.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Case Finder — Index Stats");
    println!("=========================");
    println!();
    println!("  Index:       {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Backend:     {}", stats.mode);
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Tracked:     {}", stats.tracked);

    if !stats.by_year.is_empty() {
        println!();
        println!("  By year:");
        println!("  {:<24} {:>8}", "YEAR", "DOCS");
        println!("  {}", "-".repeat(33));
        for (year, count) in &stats.by_year {
            let label = if year.is_empty() { "(none)" } else { year.as_str() };
            println!("  {:<24} {:>8}", label, count);
        }
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
