//! Indexing pipeline orchestration.
//!
//! Walks a directory tree, and for every candidate document compares the
//! on-disk mtime with the one recorded in the store. Unchanged documents
//! are skipped without extraction; changed or new ones are extracted and
//! committed (document + mtime) in a single transaction.
//!
//! Per-document state: `Discovered → MtimeChecked → Skipped | Extracted → Committed`.
//!
//! Cancellation is cooperative and checked before each candidate. A
//! document whose extraction is in flight runs to completion but is not
//! committed, so it is picked up again by the next run; everything
//! committed before the signal stays committed.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::config::{Config, IndexConfig};
use crate::extract::{Extractor, PdfExtractor};
use crate::models::DocumentRecord;
use crate::progress::{
    ChannelProgress, DocOutcome, IndexEvent, IndexProgressReporter, IndexSummary, ProgressMode,
    RunStatus,
};
use crate::store::IndexStore;

/// Shared cancellation flag passed into a run by its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs for a single indexing run.
#[derive(Clone, Debug)]
pub struct IndexOptions {
    /// Document extension without the dot, matched case-insensitively.
    pub extension: String,
    pub follow_symlinks: bool,
    /// Delete records for files under the base directory that no longer exist.
    pub prune: bool,
}

impl IndexOptions {
    pub fn from_config(index: &IndexConfig, prune: bool) -> Self {
        Self {
            extension: index.extension.clone(),
            follow_symlinks: index.follow_symlinks,
            prune,
        }
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default(), false)
    }
}

/// Recursively lists files under `root` whose name ends in `.extension`,
/// in file-name order. Unreadable directory entries are logged and skipped.
pub fn discover_documents(root: &Path, extension: &str, follow_symlinks: bool) -> Vec<PathBuf> {
    let suffix = format!(".{}", extension.to_lowercase());
    let mut found = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(follow_symlinks)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(&suffix) {
            found.push(entry.into_path());
        }
    }
    found
}

/// Modification time in fractional seconds since the Unix epoch.
pub fn file_mtime(path: &Path) -> Option<f64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(system_time_secs(modified))
}

fn system_time_secs(t: SystemTime) -> f64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Runs one indexing pass over `base_dir`.
///
/// Store failures abort the run with an error; extraction failures and
/// unreadable metadata never do.
pub async fn run_index(
    base_dir: &Path,
    store: &IndexStore,
    extractor: Arc<dyn Extractor>,
    options: &IndexOptions,
    reporter: &dyn IndexProgressReporter,
    cancel: &CancelToken,
) -> Result<IndexSummary> {
    if !base_dir.is_dir() {
        bail!("Base directory does not exist: {}", base_dir.display());
    }
    let root = std::fs::canonicalize(base_dir)
        .with_context(|| format!("Failed to resolve {}", base_dir.display()))?;

    let candidates = discover_documents(&root, &options.extension, options.follow_symlinks);
    let total = candidates.len() as u64;
    tracing::info!(root = %root.display(), total, "discovered documents");
    reporter.report(IndexEvent::Discovered { total });

    let mut summary = IndexSummary {
        total,
        processed: 0,
        indexed: 0,
        skipped: 0,
        unreadable: 0,
        pruned: 0,
        status: RunStatus::Completed,
    };

    for path in candidates {
        if cancel.is_cancelled() {
            tracing::info!(processed = summary.processed, "indexing cancelled");
            summary.status = RunStatus::Cancelled;
            break;
        }

        let key = path.to_string_lossy().to_string();
        let Some(outcome) = process_document(&path, &key, store, &extractor, cancel).await?
        else {
            tracing::info!(path = %key, "cancelled during extraction, left for the next run");
            summary.status = RunStatus::Cancelled;
            break;
        };
        match outcome {
            DocOutcome::Indexed => summary.indexed += 1,
            DocOutcome::Skipped => summary.skipped += 1,
            DocOutcome::Unreadable => summary.unreadable += 1,
        }
        summary.processed += 1;

        reporter.report(IndexEvent::Processed {
            n: summary.processed,
            total,
            path: key,
            outcome,
        });
    }

    if options.prune && summary.status == RunStatus::Completed {
        summary.pruned = prune_missing(store, &root).await?;
    }

    tracing::info!(
        indexed = summary.indexed,
        skipped = summary.skipped,
        unreadable = summary.unreadable,
        pruned = summary.pruned,
        "indexing finished"
    );
    reporter.report(IndexEvent::Finished {
        summary: summary.clone(),
    });
    Ok(summary)
}

/// Returns `None` when cancellation arrived while the extractor was running.
/// Nothing is committed in that case, so the document is retried later.
async fn process_document(
    path: &Path,
    key: &str,
    store: &IndexStore,
    extractor: &Arc<dyn Extractor>,
    cancel: &CancelToken,
) -> Result<Option<DocOutcome>> {
    let Some(mtime) = file_mtime(path) else {
        tracing::warn!(path = %key, "cannot read modification time, skipping");
        return Ok(Some(DocOutcome::Unreadable));
    };

    if store.get_mtime(key).await? == Some(mtime) {
        tracing::debug!(path = %key, "unchanged");
        return Ok(Some(DocOutcome::Skipped));
    }

    let worker = Arc::clone(extractor);
    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || worker.extract(&owned))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(path = %key, error = %e, "extraction task failed");
            String::new()
        });

    // A signal during extraction may have interrupted the OCR helpers, so the
    // text cannot be trusted as the document's final content.
    if cancel.is_cancelled() {
        return Ok(None);
    }
    if text.is_empty() {
        tracing::debug!(path = %key, "no text extracted");
    }

    let record = DocumentRecord::from_path(path, text);
    store.commit(&record, mtime).await?;
    tracing::debug!(path = %key, year = %record.year, "indexed");
    Ok(Some(DocOutcome::Indexed))
}

/// Deletes tracked documents under `root` whose files are gone.
async fn prune_missing(store: &IndexStore, root: &Path) -> Result<u64> {
    let mut pruned = 0;
    for tracked in store.tracked_paths().await? {
        let path = Path::new(&tracked);
        if path.starts_with(root) && !path.exists() {
            store.delete(&tracked).await?;
            tracing::debug!(path = %tracked, "pruned");
            pruned += 1;
        }
    }
    Ok(pruned)
}

/// A run executing on a background task.
///
/// The front end drains `events` on its own schedule, flips `cancel` to
/// stop early, and awaits `join` for the final summary.
pub struct IndexHandle {
    pub events: UnboundedReceiver<IndexEvent>,
    pub cancel: CancelToken,
    pub join: JoinHandle<Result<IndexSummary>>,
}

/// Starts [`run_index`] on a tokio task. The caller must not start a second
/// run against the same store while this one is in flight.
pub fn spawn_index(
    base_dir: PathBuf,
    store: IndexStore,
    extractor: Arc<dyn Extractor>,
    options: IndexOptions,
) -> IndexHandle {
    let (tx, events) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancelToken::new();
    let token = cancel.clone();

    let join = tokio::spawn(async move {
        let reporter = ChannelProgress::new(tx);
        run_index(&base_dir, &store, extractor, &options, &reporter, &token).await
    });

    IndexHandle {
        events,
        cancel,
        join,
    }
}

/// CLI entry point for `casefind index`.
pub async fn run_index_command(
    config: &Config,
    base_dir: &Path,
    prune: bool,
    progress: ProgressMode,
) -> Result<()> {
    let store = IndexStore::create(&config.db.path, config.db.backend).await?;
    let extractor: Arc<dyn Extractor> = Arc::new(PdfExtractor::new(config.extraction.clone()));
    let options = IndexOptions::from_config(&config.index, prune);

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let reporter = progress.reporter();
    let summary = run_index(
        base_dir,
        &store,
        extractor,
        &options,
        reporter.as_ref(),
        &cancel,
    )
    .await?;

    println!("index {}", base_dir.display());
    println!("  documents found: {}", summary.total);
    println!("  indexed: {}", summary.indexed);
    println!("  unchanged: {}", summary.skipped);
    println!("  unreadable: {}", summary.unreadable);
    if prune {
        println!("  pruned: {}", summary.pruned);
    }
    println!("  backend: {}", store.mode());
    match summary.status {
        RunStatus::Completed => println!("ok"),
        RunStatus::Cancelled => println!(
            "cancelled after {} of {} documents",
            summary.processed, summary.total
        ),
    }

    store.close().await;
    Ok(())
}
