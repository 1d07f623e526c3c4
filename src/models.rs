//! Core data models used throughout Case Finder.
//!
//! These types represent the indexed documents and search results that flow
//! between the indexing pipeline, the store, and the query engine.

use serde::Serialize;
use std::path::Path;

/// One indexed document, keyed by its file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub path: String,
    /// Display label: the file's base name without extension.
    pub case_name: String,
    /// Facet value: the name of the immediate parent directory.
    pub year: String,
    pub content: String,
}

impl DocumentRecord {
    /// Builds a record for `path`, deriving `case_name` and `year` from the
    /// file name and its parent directory.
    pub fn from_path(path: &Path, content: String) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            case_name: case_name_for(path),
            year: year_for(path),
            content,
        }
    }
}

/// File base name with the extension stripped.
pub fn case_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Name of the immediate parent directory. Not validated as a number.
pub fn year_for(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// A search hit returned from the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub case_name: String,
    pub year: String,
    pub path: String,
    pub snippet: String,
}
