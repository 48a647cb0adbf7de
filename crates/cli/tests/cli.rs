//! CLI end-to-end tests
//!
//! These use the `copy` command, which needs no external tools.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the mediapress binary
#[allow(deprecated)]
fn mediapress_cmd() -> Command {
    let mut cmd = Command::cargo_bin("mediapress").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_video(dir: &Path, name: &str, bytes: usize) {
    fs::write(dir.join(name), vec![0x42u8; bytes]).unwrap();
}

#[test]
fn test_cli_no_args_shows_help() {
    mediapress_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    mediapress_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediapress"))
        .stdout(predicate::str::contains("compress"));
}

#[test]
fn test_cli_version_flag() {
    mediapress_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediapress"));
}

#[test]
fn test_copy_publishes_every_video() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("public");
    let output = source.join("optimized-videos");
    fs::create_dir(&source).unwrap();
    write_video(&source, "a.mp4", 2048);
    write_video(&source, "b.mp4", 1024);
    write_video(&source, "poster.jpg", 10);

    mediapress_cmd()
        .arg("copy")
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 video(s) to process"))
        .stdout(predicate::str::contains("2 succeeded, 0 failed"));

    assert_eq!(fs::read(output.join("a.mp4")).unwrap().len(), 2048);
    assert_eq!(fs::read(output.join("b.mp4")).unwrap().len(), 1024);
    assert!(!output.join("poster.jpg").exists());
}

#[test]
fn test_failed_file_exits_with_job_failure_code() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("public");
    let output = source.join("optimized-videos");
    fs::create_dir(&source).unwrap();
    write_video(&source, "a.mp4", 2048);
    write_video(&source, "b.mp4", 1024);
    // A directory in the way makes b.mp4 unwritable
    fs::create_dir_all(output.join("b.mp4")).unwrap();

    mediapress_cmd()
        .arg("copy")
        .arg("--source")
        .arg(&source)
        .arg("--output")
        .arg(&output)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("1 succeeded, 1 failed"))
        .stdout(predicate::str::contains("Failed:\n  b.mp4: "))
        .stderr(predicate::str::contains("Error processing b.mp4"));

    assert_eq!(fs::read(output.join("a.mp4")).unwrap().len(), 2048);
    assert!(output.join("b.mp4").is_dir());
}

#[test]
fn test_copy_json_summary() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src");
    fs::create_dir(&source).unwrap();
    write_video(&source, "clip.mp4", 100);

    let assert = mediapress_cmd()
        .args(["copy", "--json", "--source"])
        .arg(&source)
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["attempted"], 1);
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["records"][0]["file_name"], "clip.mp4");
    assert_eq!(summary["records"][0]["status"], "succeeded");
}

#[test]
fn test_missing_source_is_fatal() {
    let dir = tempdir().unwrap();

    mediapress_cmd()
        .arg("copy")
        .arg("--source")
        .arg(dir.path().join("missing"))
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Directory not found"));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_invalid_crf_is_rejected() {
    let dir = tempdir().unwrap();

    mediapress_cmd()
        .args(["compress", "--crf", "99", "--source"])
        .arg(dir.path())
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("crf"));
}

#[test]
fn test_show_config_reads_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("mediapress.toml");
    fs::write(&config_path, "[profile]\ncrf = 24\n").unwrap();

    mediapress_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("crf = 24"))
        .stdout(predicate::str::contains("max_width = 1280"));
}

#[test]
fn test_missing_config_file_is_fatal() {
    let dir = tempdir().unwrap();

    mediapress_cmd()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("show-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_check_tools_reports_missing_ffmpeg() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("mediapress.toml");
    fs::write(
        &config_path,
        format!(
            "[encoder]\nffmpeg_path = {:?}\nffprobe_path = {:?}\n",
            dir.path().join("no-ffmpeg"),
            dir.path().join("no-ffprobe")
        ),
    )
    .unwrap();

    mediapress_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("check-tools")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Missing tools"));
}
