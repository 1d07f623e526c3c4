use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config/casefind.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub backend: BackendPreference,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            backend: BackendPreference::Auto,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./cases.db")
}

/// Which search backend a freshly created store should use.
///
/// Only consulted when the store file is new; an existing store keeps the
/// mode it was created with.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Use FTS5 when the SQLite build supports it, otherwise substring matching.
    #[default]
    Auto,
    /// Require FTS5; creating the store fails if it is unavailable.
    Fts5,
    /// Always use the plain table with substring matching.
    Substring,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            follow_symlinks: false,
        }
    }
}

fn default_extension() -> String {
    "pdf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Enables the rasterize + OCR fallback for documents with little text.
    #[serde(default)]
    pub ocr: bool,
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    /// Directory containing `pdftoppm`, when it is not on `PATH`.
    #[serde(default)]
    pub poppler_path: Option<PathBuf>,
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr: false,
            min_text_chars: default_min_text_chars(),
            ocr_dpi: default_ocr_dpi(),
            poppler_path: None,
            tesseract_cmd: default_tesseract_cmd(),
            ocr_language: default_ocr_language(),
        }
    }
}

fn default_min_text_chars() -> usize {
    100
}
fn default_ocr_dpi() -> u32 {
    200
}
fn default_tesseract_cmd() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_snippet_window")]
    pub snippet_window: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            snippet_window: default_snippet_window(),
        }
    }
}

fn default_limit() -> i64 {
    50
}
fn default_snippet_window() -> usize {
    120
}

impl Config {
    /// Checks value ranges and normalizes the document extension.
    pub fn validate(mut self) -> Result<Self> {
        let ext = self.index.extension.trim().trim_start_matches('.').to_string();
        if ext.is_empty() {
            bail!("index.extension must not be empty");
        }
        self.index.extension = ext;

        if self.search.limit < 1 {
            bail!("search.limit must be >= 1");
        }
        if self.search.snippet_window == 0 {
            bail!("search.snippet_window must be >= 1");
        }
        if !(50..=1200).contains(&self.extraction.ocr_dpi) {
            bail!(
                "extraction.ocr_dpi must be in [50, 1200], got {}",
                self.extraction.ocr_dpi
            );
        }
        Ok(self)
    }
}

/// Parses and validates a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    config.validate()
}

/// Loads `path`, falling back to built-in defaults when the default config
/// file simply does not exist. An explicitly named file must be readable.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        return Config::default().validate();
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("./cases.db"));
        assert_eq!(cfg.db.backend, BackendPreference::Auto);
        assert_eq!(cfg.index.extension, "pdf");
        assert!(!cfg.extraction.ocr);
        assert_eq!(cfg.extraction.min_text_chars, 100);
        assert_eq!(cfg.extraction.ocr_dpi, 200);
        assert_eq!(cfg.search.limit, 50);
        assert_eq!(cfg.search.snippet_window, 120);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = parse(
            r#"
[db]
path = "/tmp/x.db"
backend = "substring"

[index]
extension = ".PDF"

[extraction]
ocr = true
ocr_dpi = 300
poppler_path = "/opt/poppler/bin"

[search]
limit = 5
"#,
        )
        .unwrap();
        assert_eq!(cfg.db.backend, BackendPreference::Substring);
        assert_eq!(cfg.index.extension, "PDF");
        assert!(cfg.extraction.ocr);
        assert_eq!(cfg.extraction.ocr_dpi, 300);
        assert_eq!(
            cfg.extraction.poppler_path,
            Some(PathBuf::from("/opt/poppler/bin"))
        );
        assert_eq!(cfg.search.limit, 5);
    }

    #[test]
    fn zero_limit_rejected() {
        let err = parse("[search]\nlimit = 0\n").unwrap_err();
        assert!(err.to_string().contains("search.limit"));
    }

    #[test]
    fn dpi_out_of_range_rejected() {
        assert!(parse("[extraction]\nocr_dpi = 10\n").is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(toml::from_str::<Config>("[db]\nbackend = \"lucene\"\n").is_err());
    }

    #[test]
    fn missing_default_config_falls_back() {
        // Only meaningful when no config exists in the test working directory.
        if !Path::new(DEFAULT_CONFIG_PATH).exists() {
            let cfg = load_or_default(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
            assert_eq!(cfg.search.limit, 50);
        }
    }

    #[test]
    fn missing_explicit_config_is_error() {
        let err = load_or_default(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
