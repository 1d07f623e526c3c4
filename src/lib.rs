//! # Case Finder
//!
//! Incremental full-text indexing and keyword search for a directory tree of
//! case documents organized by year.
//!
//! Case Finder walks a folder such as `cases/2019/*.pdf`, extracts text from
//! each document (falling back to OCR for scanned files), and stores it in a
//! single-file SQLite index keyed by path. Unchanged files are skipped on
//! later runs by comparing modification times. Searches accept a keyword or
//! phrase plus an optional exact year filter and return highlighted snippets.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐
//! │  Pipeline   │──▶│  Extractor  │   │   IndexStore     │
//! │ walk+mtime  │   │ PDF → OCR   │   │ FTS5 | substring │
//! └──────┬──────┘   └─────────────┘   └────────┬─────────┘
//!        └───────────── commit ────────────────▶│
//!                                               │
//!                       ┌──────────────┐        │
//!                       │ Query engine │◀───────┘
//!                       │  + snippets  │
//!                       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! casefind index --base-dir ./cases --db ./cases.db --ocr
//! casefind search "theft" --db ./cases.db --year 2020 --limit 20
//! casefind stats --db ./cases.db
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction with OCR fallback |
//! | [`store`] | Change-tracked index store with dual backends |
//! | [`ingest`] | Indexing pipeline, cancellation, background runs |
//! | [`progress`] | Progress events and reporters |
//! | [`search`] | Query engine and snippet highlighting |
//! | [`get`] | Single-document lookup |
//! | [`stats`] | Index statistics |
//! | [`db`] | Database connection |

pub mod config;
pub mod db;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod search;
pub mod stats;
pub mod store;
