//! End-to-end tests that drive the `casefind` binary.
//!
//! The PDFs written here have no readable text layer, so their content is
//! indexed as empty; FTS5 mode still matches on case name and year.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn casefind_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_casefind"))
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let cases = root.join("cases");
    fs::create_dir_all(cases.join("2019")).unwrap();
    fs::create_dir_all(cases.join("2020")).unwrap();
    fs::write(cases.join("2019").join("jones.pdf"), b"not a valid pdf").unwrap();
    fs::write(cases.join("2020").join("smith.pdf"), b"not a valid pdf").unwrap();
    fs::write(cases.join("2020").join("notes.txt"), "ignored").unwrap();

    let db = root.join("data").join("cases.db");
    (tmp, cases, db)
}

fn run_casefind(args: &[&str]) -> (String, String, bool) {
    let binary = casefind_binary();
    let output = Command::new(&binary)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run casefind binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_casefind_in(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(casefind_binary())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run casefind binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn s(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn index(cases: &Path, db: &Path) -> String {
    let (stdout, stderr, success) =
        run_casefind(&["index", "--base-dir", s(cases), "--db", s(db)]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_index_and_is_idempotent() {
    let (_tmp, _cases, db) = setup_test_env();

    let (stdout, stderr, success) = run_casefind(&["init", "--db", s(&db)]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(stdout.contains("backend: fts5"), "{}", stdout);
    assert!(db.exists());

    let (_, _, success) = run_casefind(&["init", "--db", s(&db)]);
    assert!(success, "second init failed (not idempotent)");
}

#[test]
fn test_index_then_reindex_skips_unchanged() {
    let (_tmp, cases, db) = setup_test_env();

    let stdout = index(&cases, &db);
    assert!(stdout.contains("documents found: 2"), "{}", stdout);
    assert!(stdout.contains("indexed: 2"), "{}", stdout);
    assert!(stdout.contains("ok"));

    let stdout = index(&cases, &db);
    assert!(stdout.contains("indexed: 0"), "{}", stdout);
    assert!(stdout.contains("unchanged: 2"), "{}", stdout);
}

#[test]
fn test_search_matches_case_name_with_year_filter() {
    let (_tmp, cases, db) = setup_test_env();
    index(&cases, &db);

    let (stdout, _, success) = run_casefind(&["search", "smith", "--db", s(&db)]);
    assert!(success, "search failed");
    assert!(
        stdout.contains("Year: 2020 | Case: smith"),
        "expected smith in results, got: {}",
        stdout
    );

    let (stdout, _, success) =
        run_casefind(&["search", "smith", "--db", s(&db), "--year", "2019"]);
    assert!(success);
    assert!(stdout.contains("No matches found."), "{}", stdout);
}

#[test]
fn test_search_no_matches_is_not_an_error() {
    let (_tmp, cases, db) = setup_test_env();
    index(&cases, &db);

    let (stdout, stderr, success) = run_casefind(&["search", "nonexistent", "--db", s(&db)]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains("No matches found."));
}

#[test]
fn test_search_missing_index_fails_with_location() {
    let (_tmp, _cases, db) = setup_test_env();

    let (_, stderr, success) = run_casefind(&["search", "theft", "--db", s(&db)]);
    assert!(!success, "search on missing index must fail");
    assert!(stderr.contains("no index found"), "{}", stderr);
    assert!(stderr.contains("cases.db"), "{}", stderr);
    assert!(!db.exists(), "search must not create the index");
}

#[test]
fn test_search_json_output() {
    let (_tmp, cases, db) = setup_test_env();
    index(&cases, &db);

    let (stdout, _, success) = run_casefind(&["search", "jones", "--db", s(&db), "--json"]);
    assert!(success);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["year"], "2019");
    assert_eq!(rows[0]["case_name"], "jones");
}

#[test]
fn test_search_rejects_zero_limit() {
    let (_tmp, cases, db) = setup_test_env();
    index(&cases, &db);

    let (_, _, success) = run_casefind(&["search", "smith", "--db", s(&db), "--limit", "0"]);
    assert!(!success);
}

#[test]
fn test_stats_and_get() {
    let (_tmp, cases, db) = setup_test_env();
    index(&cases, &db);

    let (stdout, _, success) = run_casefind(&["stats", "--db", s(&db)]);
    assert!(success);
    assert!(stdout.contains("Documents:   2"), "{}", stdout);
    assert!(stdout.contains("2019"));
    assert!(stdout.contains("2020"));

    let smith = fs::canonicalize(cases.join("2020").join("smith.pdf")).unwrap();
    let (stdout, stderr, success) = run_casefind(&["get", s(&smith), "--db", s(&db)]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("year:      2020"), "{}", stdout);
    assert!(stdout.contains("(no text extracted)"));
}

#[test]
fn test_json_progress_on_stderr() {
    let (_tmp, cases, db) = setup_test_env();

    let (stdout, stderr, success) = run_casefind(&[
        "index",
        "--base-dir",
        s(&cases),
        "--db",
        s(&db),
        "--progress",
        "json",
    ]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("indexed: 2"));
    assert!(stderr.contains("\"event\":\"discovered\""), "{}", stderr);
    assert!(stderr.contains("\"event\":\"finished\""), "{}", stderr);
}

#[test]
fn test_substring_backend_from_config() {
    let (tmp, cases, db) = setup_test_env();
    let config_path = tmp.path().join("casefind.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}\"\nbackend = \"substring\"\n",
            db.display()
        ),
    )
    .unwrap();

    let (stdout, stderr, success) = run_casefind(&[
        "--config",
        s(&config_path),
        "index",
        "--base-dir",
        s(&cases),
    ]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("backend: substring"), "{}", stdout);

    // Substring mode matches content only; these PDFs have none.
    let (stdout, _, success) = run_casefind(&["--config", s(&config_path), "search", "smith"]);
    assert!(success);
    assert!(stdout.contains("No matches found."));
}

#[test]
fn test_missing_base_dir_fails() {
    let (tmp, _cases, db) = setup_test_env();
    let missing = tmp.path().join("nowhere");

    let (_, stderr, success) = run_casefind(&["index", "--base-dir", s(&missing), "--db", s(&db)]);
    assert!(!success);
    assert!(stderr.contains("nowhere"), "{}", stderr);
}

#[test]
fn test_get_resolves_relative_path() {
    let (tmp, cases, db) = setup_test_env();
    index(&cases, &db);

    let (stdout, stderr, success) =
        run_casefind_in(tmp.path(), &["get", "cases/2020/smith.pdf", "--db", s(&db)]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("case:      smith"), "{}", stdout);
}

/// A terminal Ctrl-C signals the whole foreground process group. Here the
/// fake rasterizer signals its own group and ignores the signal itself, so
/// `casefind` is only interrupted if it shares that group.
#[cfg(unix)]
#[test]
fn test_ocr_helpers_do_not_share_signals_with_indexer() {
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::process::CommandExt;

    let (tmp, cases, db) = setup_test_env();
    let bin = tmp.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let write_script = |path: &Path, body: &str| {
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    };
    write_script(
        &bin.join("pdftoppm"),
        r#"trap '' INT
kill -INT 0
sleep 1
: > "$5-1.png""#,
    );
    let tesseract = bin.join("tesseract");
    write_script(&tesseract, "echo RECOGNIZED verdict");

    let config_path = tmp.path().join("casefind.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}\"\n\n[extraction]\nocr = true\npoppler_path = \"{}\"\ntesseract_cmd = \"{}\"\n",
            db.display(),
            bin.display(),
            tesseract.display()
        ),
    )
    .unwrap();
    fs::remove_file(cases.join("2019").join("jones.pdf")).unwrap();

    // Own group, so the signal can never reach the test harness.
    let output = Command::new(casefind_binary())
        .args(["--config", s(&config_path), "index", "--base-dir", s(&cases)])
        .process_group(0)
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("indexed: 1"), "{}", stdout);
    assert!(stdout.contains("ok"), "{}", stdout);

    let (stdout, _, success) = run_casefind(&["--config", s(&config_path), "search", "RECOGNIZED"]);
    assert!(success);
    assert!(stdout.contains("Case: smith"), "{}", stdout);
}
