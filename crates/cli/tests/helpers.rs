use std::fs;
use std::path::Path;

use acfg_builder::{canonicalize_or_current, log_filter};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current(Path::new(".")).expect("canonicalize");
    assert_eq!(result, cwd);
}

#[test]
fn canonicalize_or_current_resolves_existing_path() {
    let tmp = tempdir().expect("tempdir");
    let subdir = tmp.path().join("nested");
    fs::create_dir_all(&subdir).expect("create nested");

    let result = canonicalize_or_current(&subdir).expect("canonicalize nested");
    assert_eq!(result, subdir.canonicalize().expect("canonicalize subdir"));
}

#[test]
fn canonicalize_or_current_keeps_missing_absolute_path() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("not-yet");
    assert_eq!(canonicalize_or_current(&missing).expect("resolve"), missing);
}

#[test]
fn canonicalize_or_current_joins_missing_relative_path() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current(Path::new("no/such/dir")).expect("resolve");
    assert_eq!(result, cwd.join("no/such/dir"));
}

#[test]
fn log_filter_accepts_levels_and_rejects_garbage() {
    assert!(log_filter(Some("debug")).is_ok());
    assert!(log_filter(Some("acfg_core=trace,info")).is_ok());
    assert!(log_filter(Some("acfg_core=notalevel")).is_err());
    assert!(log_filter(None).is_ok());
}
