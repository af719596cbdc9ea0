use std::fs;
use std::path::Path;

use predicates::prelude::*;
use tempfile::tempdir;

const LISTING: &str = "\
.text:00401000 sub_401000      proc near
.text:00401000 55                 push    ebp
.text:00401001 8B EC              mov     ebp, esp
.text:00401003 85 C0              test    eax, eax
.text:00401005 74 03              jz      short loc_40100A
.text:00401007 33 C0              xor     eax, eax
.text:00401009 40                 inc     eax
.text:0040100A loc_40100A:
.text:0040100A 5D                 pop     ebp
.text:0040100B C3                 retn
";

fn seed_samples(root: &Path) {
    fs::write(root.join("alpha.asm"), LISTING).expect("alpha");
    fs::write(root.join("beta.asm"), ".text:00401000 C3   retn\n").expect("beta");
    fs::write(root.join("gamma.asm"), LISTING).expect("gamma");
    fs::write(root.join("labels.csv"), "Id,Class\nalpha,2\nbeta,7\n").expect("labels");
}

/// Running with no subcommand prints the version.
#[test]
fn default_command_prints_version() {
    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .assert()
        .success()
        .stdout(predicate::str::contains("acfg-core v"));
}

#[test]
fn list_extractors_json_includes_listing() {
    let output = assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .args(["list-extractors", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let names: Vec<&str> = parsed
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|e| e.get("name").and_then(|n| n.as_str()))
        .collect();
    assert!(names.contains(&"listing"), "{names:?}");
}

#[test]
fn build_writes_corpus_and_reports_skips() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    seed_samples(root);

    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("build")
        .arg("--source-dir")
        .arg(root)
        .arg("--labels")
        .arg(root.join("labels.csv"))
        .args(["--workers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aggregated: 2"))
        .stdout(predicate::str::contains("gamma [missing_label]"));

    let corpus = fs::read_to_string(root.join("Acfg.txt")).expect("corpus");
    assert!(corpus.starts_with("2\n3 2\n"), "{corpus}");
    assert!(corpus.contains("\n1 7\n1 0 1 0 0 0 1 0 0 0 0 0\n"), "{corpus}");
    assert!(root.join("Acfg.txt.manifest.json").is_file());
    assert!(!root.join("alpha.features.txt").exists());
}

#[test]
fn build_json_summary_and_keep_artifacts() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    seed_samples(root);
    let out = root.join("out");
    fs::create_dir_all(&out).expect("out dir");

    let output = assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("build")
        .arg("--source-dir")
        .arg(root)
        .arg("--labels")
        .arg(root.join("labels.csv"))
        .arg("--artifact-dir")
        .arg(&out)
        .args(["--corpus-name", "train.txt", "--keep-artifacts", "--no-manifest", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(summary["discovered"], 3);
    assert_eq!(summary["aggregated"].as_array().expect("array").len(), 2);
    assert_eq!(summary["cleanup_ran"], false);
    assert!(summary["manifest_path"].is_null());
    assert!(out.join("train.txt").is_file());
    assert!(out.join("alpha.features.txt").is_file());
    assert!(out.join("beta.adjacent.npz").is_file());
}

#[test]
fn build_reads_yaml_config_and_flags_override_it() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    seed_samples(root);
    fs::write(
        root.join("pipeline.yaml"),
        "source_dir: .\nlabel_path: labels.csv\nworkers: 1\ncorpus_file_name: from-config.txt\n",
    )
    .expect("config");

    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("build")
        .arg("--config")
        .arg(root.join("pipeline.yaml"))
        .args(["--corpus-name", "from-flag.txt"])
        .assert()
        .success();

    assert!(root.join("from-flag.txt").is_file());
    assert!(!root.join("from-config.txt").exists());
}

#[test]
fn build_fails_without_source_dir() {
    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source-dir is required"));
}

#[test]
fn build_rejects_zero_workers_and_unknown_extractor() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    seed_samples(root);

    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("build")
        .arg("--source-dir")
        .arg(root)
        .arg("--labels")
        .arg(root.join("labels.csv"))
        .args(["--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workers must be at least 1"));

    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("build")
        .arg("--source-dir")
        .arg(root)
        .arg("--labels")
        .arg(root.join("labels.csv"))
        .args(["--extractor", "ghidra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown extractor 'ghidra'"));
    assert!(!root.join("Acfg.txt").exists());
}

#[test]
fn inspect_reports_label_counts() {
    let dir = tempdir().expect("tempdir");
    let corpus = dir.path().join("Acfg.txt");
    fs::write(&corpus, "3\n1 0\n1 0 4\n2 1\n1 1 1 5\n1 0 6\n1 1\n1 0 7\n").expect("corpus");

    let output = assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("inspect")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--json")
        .output()
        .expect("run");
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(stats["samples"], 3);
    assert_eq!(stats["nodes"], 4);
    assert_eq!(stats["edges"], 1);
    assert_eq!(stats["labels"]["1"], 2);
    assert_eq!(stats["labels"]["0"], 1);
}

#[test]
fn inspect_fails_on_malformed_corpus() {
    let dir = tempdir().expect("tempdir");
    let corpus = dir.path().join("Acfg.txt");
    fs::write(&corpus, "2\n1 0\n1 0 4\n").expect("corpus");

    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("inspect")
        .arg("--corpus")
        .arg(&corpus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed corpus"));
}

#[test]
fn discover_insts_exports_csv() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    seed_samples(root);

    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .arg("discover-insts")
        .arg("--source-dir")
        .arg(root)
        .arg("--export")
        .arg(root.join("InstDict"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Mnemonics: 8"));

    let csv = fs::read_to_string(root.join("InstDict.csv")).expect("csv");
    assert_eq!(csv.lines().next(), Some(",Inst"));
    assert_eq!(csv.lines().count(), 9);
}

#[test]
fn invalid_log_level_is_rejected() {
    assert_cmd::cargo::cargo_bin_cmd!("acfg-builder")
        .args(["--log-level", "acfg_core=notalevel", "version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --log-level"));
}
