//! End-to-end CLI tests for the music-get binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn music_get(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("music-get").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("music.163.com"))
        .stdout(predicate::str::contains("--concurrency"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("music-get"));
}

/// Test that a missing URL is a usage error.
#[test]
fn test_binary_without_url_fails() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .args(["--invalid-flag", "https://music.163.com/#/song?id=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that an unsupported site fails before any file is touched.
#[test]
fn test_binary_unsupported_url_fails() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .args(["-q", "https://example.com/song/1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported music address"));
    assert!(!dir.path().join("music-get.json").exists());
    assert!(!dir.path().join("downloads").exists());
}

/// Test that a known site with an unrecognized path is rejected.
#[test]
fn test_binary_invalid_address_fails() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .args(["-q", "https://music.163.com/#/discover"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

/// Test that concurrency outside 1-16 is rejected by the parser.
#[test]
fn test_binary_concurrency_out_of_range() {
    let dir = TempDir::new().unwrap();
    music_get(&dir)
        .args(["-n", "32", "https://music.163.com/#/song?id=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("32"));
}

/// Test that a malformed config file is reported before any request.
#[test]
fn test_binary_malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("music-get.json"), "{ not json").unwrap();
    music_get(&dir)
        .args(["-q", "https://music.163.com/#/song?id=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"));
}
