//! Indexing progress reporting.
//!
//! The pipeline emits one [`IndexEvent`] per candidate document, so users see
//! what is being scanned and how much is left. CLI reporters write to
//! **stderr** so stdout remains parseable for scripts. [`ChannelProgress`]
//! forwards events over a tokio channel to a front end that drains them on
//! its own schedule instead of being called inline from the worker.

use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc::UnboundedSender;

/// What happened to one candidate document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocOutcome {
    /// Text extracted and committed to the store.
    Indexed,
    /// Stored mtime matches the file; nothing was extracted.
    Skipped,
    /// File metadata could not be read; the store was not touched.
    Unreadable,
}

/// How a run ended. Neither variant is an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Counters for a finished (or cancelled) indexing run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IndexSummary {
    pub total: u64,
    pub processed: u64,
    pub indexed: u64,
    pub skipped: u64,
    pub unreadable: u64,
    pub pruned: u64,
    pub status: RunStatus,
}

/// A single progress event for an indexing run.
#[derive(Clone, Debug)]
pub enum IndexEvent {
    /// Directory walk finished; `total` candidates will be processed.
    Discovered { total: u64 },
    /// `n` of `total` candidates handled; `path` was the latest.
    Processed {
        n: u64,
        total: u64,
        path: String,
        outcome: DocOutcome,
    },
    /// The run is over.
    Finished { summary: IndexSummary },
}

/// Receives progress events from the pipeline.
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexEvent);
}

/// Human-friendly progress on stderr: "indexing  12 / 340  2020/smith.pdf".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexEvent) {
        let line = match &event {
            IndexEvent::Discovered { total } => {
                format!("index  found {} documents\n", format_number(*total))
            }
            IndexEvent::Processed {
                n,
                total,
                path,
                outcome,
            } => {
                let tag = match outcome {
                    DocOutcome::Indexed => "indexed",
                    DocOutcome::Skipped => "unchanged",
                    DocOutcome::Unreadable => "unreadable",
                };
                format!(
                    "index  {} / {}  {}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    tag,
                    short_name(path)
                )
            }
            IndexEvent::Finished { summary } => match summary.status {
                RunStatus::Completed => "index  done\n".to_string(),
                RunStatus::Cancelled => "index  cancelled\n".to_string(),
            },
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexEvent) {
        let obj = match &event {
            IndexEvent::Discovered { total } => serde_json::json!({
                "event": "discovered",
                "total": total
            }),
            IndexEvent::Processed {
                n,
                total,
                path,
                outcome,
            } => serde_json::json!({
                "event": "progress",
                "n": n,
                "total": total,
                "path": path,
                "outcome": outcome
            }),
            IndexEvent::Finished { summary } => serde_json::json!({
                "event": "finished",
                "summary": summary
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexEvent) {}
}

/// Forwards events to a receiver owned by another execution context.
///
/// A dropped receiver is not an error; events are discarded from then on.
pub struct ChannelProgress {
    tx: UnboundedSender<IndexEvent>,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<IndexEvent>) -> Self {
        Self { tx }
    }
}

impl IndexProgressReporter for ChannelProgress {
    fn report(&self, event: IndexEvent) {
        let _ = self.tx.send(event);
    }
}

/// Last two path components, e.g. `2020/smith.pdf`.
fn short_name(path: &str) -> String {
    let p = std::path::Path::new(path);
    match (
        p.parent().and_then(|d| d.file_name()),
        p.file_name(),
    ) {
        (Some(dir), Some(file)) => {
            format!("{}/{}", dir.to_string_lossy(), file.to_string_lossy())
        }
        _ => path.to_string(),
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
