//! End-to-end tests of the releasekit binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn releasekit() -> Command {
    Command::cargo_bin("releasekit").expect("binary built")
}

fn write_snapshot(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("workspace.json");
    let snapshot = serde_json::json!([
        {"name": "core", "version": "0.1.0", "path": "core", "manifest_path": "core/Cargo.toml"},
        {"name": "plugin_a", "version": "0.1.0", "path": "a", "manifest_path": "a/Cargo.toml",
         "internal_deps": ["core"]},
        {"name": "plugin_b", "version": "0.1.0", "path": "b", "manifest_path": "b/Cargo.toml",
         "internal_deps": ["core"]},
        {"name": "app", "version": "0.1.0", "path": "app", "manifest_path": "app/Cargo.toml",
         "internal_deps": ["plugin-a", "plugin-b"]}
    ]);
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot).expect("json")).expect("write snapshot");
    path
}

#[test]
fn test_levels_prints_one_line_per_level() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = write_snapshot(dir.path());

    releasekit()
        .arg("levels")
        .arg("--packages")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("0: core"))
        .stdout(predicate::str::contains("1: plugin-a, plugin-b"))
        .stdout(predicate::str::contains("2: app"));
}

#[test]
fn test_levels_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = write_snapshot(dir.path());

    let output = releasekit()
        .args(["levels", "--json", "--packages"])
        .arg(&snapshot)
        .output()
        .expect("run releasekit");
    assert!(output.status.success());

    let levels: Vec<Vec<String>> = serde_json::from_slice(&output.stdout).expect("levels json");
    assert_eq!(
        levels,
        vec![
            vec!["core".to_string()],
            vec!["plugin-a".to_string(), "plugin-b".to_string()],
            vec!["app".to_string()],
        ]
    );
}

#[test]
fn test_levels_reports_cycles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("workspace.json");
    let snapshot = serde_json::json!([
        {"name": "a", "version": "0.1.0", "path": "a", "manifest_path": "a/Cargo.toml", "internal_deps": ["b"]},
        {"name": "b", "version": "0.1.0", "path": "b", "manifest_path": "b/Cargo.toml", "internal_deps": ["a"]}
    ]);
    std::fs::write(&path, snapshot.to_string()).expect("write snapshot");

    releasekit()
        .arg("levels")
        .arg("--packages")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Fatal error"));
}

#[test]
fn test_parse_tag_splits_name_and_version() {
    releasekit()
        .args(["parse-tag", "core-v0.2.0"])
        .assert()
        .success()
        .stdout("core 0.2.0\n");
}

#[test]
fn test_parse_tag_with_custom_format() {
    releasekit()
        .args(["parse-tag", "py/genkit-ai@1.0.0-rc.2", "--format", "{label}/{name}@{version}"])
        .assert()
        .success()
        .stdout("genkit-ai 1.0.0-rc.2\n");
}

#[test]
fn test_parse_tag_mismatch_exits_not_ok() {
    releasekit()
        .args(["parse-tag", "not-a-release"])
        .assert()
        .code(1);
}

#[test]
fn test_status_without_state_file() {
    let dir = tempfile::tempdir().expect("tempdir");

    releasekit()
        .arg("--workspace")
        .arg(dir.path())
        .arg("status")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No run state"));
}
