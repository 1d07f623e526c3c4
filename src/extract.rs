//! Best-effort text extraction for indexed documents.
//!
//! The fast path reads the PDF text layer page by page. When that yields
//! too little text and OCR is enabled, pages are rasterized with
//! `pdftoppm` and recognized with `tesseract`; whichever result has more
//! trimmed characters is kept.
//!
//! Extraction never fails from the caller's point of view: every error is
//! logged and turned into an empty string so a single unreadable document
//! cannot abort an indexing run.

use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use crate::config::ExtractionConfig;

/// Internal extraction failure. Never crosses the [`Extractor`] boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
    #[error("rasterization failed: {0}")]
    Rasterize(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// Produces plain text for a document path. Stateless; implementations
/// must swallow their own failures and return an empty string instead.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> String;
}

/// PDF extractor with an optional OCR fallback for scanned documents.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    config: ExtractionConfig,
}

impl PdfExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    fn rasterizer(&self) -> PathBuf {
        let exe = format!("pdftoppm{}", std::env::consts::EXE_SUFFIX);
        match &self.config.poppler_path {
            Some(dir) => dir.join(exe),
            None => PathBuf::from(exe),
        }
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self, path: &Path) -> String {
        let text = extract_text_layer(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "text layer extraction failed");
            String::new()
        });

        if !self.config.ocr || !is_likely_scanned(&text, self.config.min_text_chars) {
            return text;
        }

        tracing::debug!(path = %path.display(), "little text found, running OCR");
        let ocr_text = ocr_document(
            path,
            &self.rasterizer(),
            &self.config.tesseract_cmd,
            &self.config.ocr_language,
            self.config.ocr_dpi,
        )
        .unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "OCR fallback failed");
            String::new()
        });

        prefer_longer(text, ocr_text)
    }
}

/// True when the trimmed text is shorter than `min_chars` characters.
pub fn is_likely_scanned(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() < min_chars
}

/// Keeps whichever candidate has more trimmed characters. Ties keep `primary`.
pub fn prefer_longer(primary: String, fallback: String) -> String {
    if fallback.trim().chars().count() > primary.trim().chars().count() {
        fallback
    } else {
        primary
    }
}

/// Reads the native text layer, joining non-empty pages with newlines.
fn extract_text_layer(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    // pdf-extract can panic on malformed input; treat that like any other failure.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(join_pages(pages))
}

fn join_pages(pages: Vec<String>) -> String {
    pages
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds a command for an external OCR helper.
///
/// On unix the helper gets its own process group, so a terminal Ctrl-C
/// reaches only `casefind` (which cancels cooperatively) and never kills a
/// helper halfway through a document.
fn helper_command(program: impl AsRef<std::ffi::OsStr>) -> Command {
    let mut cmd = Command::new(program);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Rasterizes every page into a scratch directory, then OCRs each image.
fn ocr_document(
    path: &Path,
    rasterizer: &Path,
    tesseract: &str,
    language: &str,
    dpi: u32,
) -> Result<String, ExtractError> {
    let scratch = tempfile::TempDir::new().map_err(|e| ExtractError::Rasterize(e.to_string()))?;
    let prefix = scratch.path().join("page");

    let output = helper_command(rasterizer)
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-png")
        .arg(path)
        .arg(&prefix)
        .output()
        .map_err(|e| {
            ExtractError::Rasterize(format!("failed to run {}: {}", rasterizer.display(), e))
        })?;
    if !output.status.success() {
        return Err(ExtractError::Rasterize(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    // pdftoppm zero-pads page numbers consistently within one run.
    let mut images: Vec<PathBuf> = std::fs::read_dir(scratch.path())
        .map_err(|e| ExtractError::Rasterize(e.to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    images.sort();

    let mut pages = Vec::with_capacity(images.len());
    for image in &images {
        pages.push(ocr_image(image, tesseract, language)?);
    }
    Ok(join_pages(pages))
}

fn ocr_image(image: &Path, tesseract: &str, language: &str) -> Result<String, ExtractError> {
    let output = helper_command(tesseract)
        .arg(image)
        .arg("stdout")
        .arg("-l")
        .arg(language)
        .output()
        .map_err(|e| ExtractError::Ocr(format!("failed to run {}: {}", tesseract, e)))?;
    if !output.status.success() {
        return Err(ExtractError::Ocr(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scanned_threshold_counts_trimmed_chars() {
        assert!(is_likely_scanned("   \n\t  ", 1));
        assert!(is_likely_scanned("  abc  ", 4));
        assert!(!is_likely_scanned("  abcd  ", 4));
        assert!(!is_likely_scanned("", 0));
    }

    #[test]
    fn longer_text_wins() {
        assert_eq!(prefer_longer("ab".into(), "abc".into()), "abc");
        assert_eq!(prefer_longer("abc".into(), "xy".into()), "abc");
        assert_eq!(prefer_longer("abc".into(), "   xyz   ".into()), "abc");
    }

    #[test]
    fn empty_pages_are_skipped_when_joining() {
        let joined = join_pages(vec!["one".into(), "  ".into(), "two".into()]);
        assert_eq!(joined, "one\ntwo");
    }

    #[test]
    fn missing_file_yields_empty_text() {
        let ex = PdfExtractor::new(ExtractionConfig::default());
        assert_eq!(ex.extract(Path::new("/nonexistent/file.pdf")), "");
    }

    #[test]
    fn corrupt_pdf_yields_empty_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.pdf");
        std::fs::write(&path, b"not a valid pdf").unwrap();

        let ex = PdfExtractor::new(ExtractionConfig::default());
        assert_eq!(ex.extract(&path), "");
    }

    #[test]
    fn failing_ocr_tools_yield_empty_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.pdf");
        std::fs::write(&path, b"not a valid pdf").unwrap();

        let config = ExtractionConfig {
            ocr: true,
            poppler_path: Some(tmp.path().join("no-such-dir")),
            tesseract_cmd: "definitely-not-tesseract".to_string(),
            ..ExtractionConfig::default()
        };
        let ex = PdfExtractor::new(config);
        assert_eq!(ex.extract(&path), "");
    }

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Fake `pdftoppm` writing three pages and a fake `tesseract` that echoes
    /// the image name. Returns (poppler dir, tesseract path).
    #[cfg(unix)]
    fn fake_ocr_tools(dir: &Path) -> (PathBuf, PathBuf) {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        // args: -r DPI -png INPUT PREFIX
        write_script(
            &bin.join("pdftoppm"),
            r#"for n in 10 02 01; do : > "$5-$n.png"; done"#,
        );
        let tesseract = bin.join("tesseract");
        write_script(&tesseract, r#"echo "page $(basename "$1")""#);
        (bin, tesseract)
    }

    #[cfg(unix)]
    #[test]
    fn ocr_pages_are_joined_in_page_order() {
        let tmp = TempDir::new().unwrap();
        let (bin, tesseract) = fake_ocr_tools(tmp.path());
        let path = tmp.path().join("scan.pdf");
        std::fs::write(&path, b"not a valid pdf").unwrap();

        let config = ExtractionConfig {
            ocr: true,
            poppler_path: Some(bin),
            tesseract_cmd: tesseract.to_string_lossy().to_string(),
            ..ExtractionConfig::default()
        };
        let text = PdfExtractor::new(config).extract(&path);
        assert_eq!(
            text,
            "page page-01.png\n\npage page-02.png\n\npage page-10.png\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn ocr_text_replaces_short_text_layer() {
        let tmp = TempDir::new().unwrap();
        let (bin, tesseract) = fake_ocr_tools(tmp.path());
        let path = tmp.path().join("scan.pdf");
        std::fs::write(&path, b"not a valid pdf").unwrap();

        let base = ExtractionConfig {
            poppler_path: Some(bin),
            tesseract_cmd: tesseract.to_string_lossy().to_string(),
            ..ExtractionConfig::default()
        };

        // Without OCR the empty text layer is all there is.
        assert_eq!(PdfExtractor::new(base.clone()).extract(&path), "");

        let ocr = PdfExtractor::new(ExtractionConfig { ocr: true, ..base });
        let text = ocr.extract(&path);
        assert!(text.contains("page page-01.png"), "{:?}", text);
        assert_eq!(prefer_longer(String::new(), text.clone()), text);
    }

    #[cfg(unix)]
    #[test]
    fn ocr_helpers_run_in_their_own_process_group() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        // Writes a page only when the script leads its own process group.
        write_script(
            &bin.join("pdftoppm"),
            r#"pgid=$(cut -d' ' -f5 /proc/$$/stat 2>/dev/null || ps -o pgid= -p $$ | tr -d ' ')
[ "$pgid" = "$$" ] && : > "$5-1.png""#,
        );
        let tesseract = bin.join("tesseract");
        write_script(&tesseract, "echo isolated");
        let path = tmp.path().join("scan.pdf");
        std::fs::write(&path, b"not a valid pdf").unwrap();

        let config = ExtractionConfig {
            ocr: true,
            poppler_path: Some(bin),
            tesseract_cmd: tesseract.to_string_lossy().to_string(),
            ..ExtractionConfig::default()
        };
        assert_eq!(PdfExtractor::new(config).extract(&path).trim(), "isolated");
    }

    #[test]
    fn rasterizer_honors_poppler_path() {
        let config = ExtractionConfig {
            poppler_path: Some(PathBuf::from("/opt/poppler/bin")),
            ..ExtractionConfig::default()
        };
        let ex = PdfExtractor::new(config);
        assert!(ex.rasterizer().starts_with("/opt/poppler/bin"));
    }
}
