//! Integration tests for `geotune download` argument handling. Transfers
//! themselves are covered against an in-memory store in the library.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_download_without_credentials_fails() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("geotune").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_ACCESS_KEY_SECRET")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .args(["download", "--bucket", "geo-data", "--prefix", "floods/", "--dest"])
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("AWS_ACCESS_KEY_ID"));
}

#[test]
fn test_download_requires_destination() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("geotune").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .args(["download", "--bucket", "geo-data", "--prefix", "floods/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--dest or --project"));
}

#[test]
fn test_download_dest_conflicts_with_project() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("geotune").unwrap();
    cmd.current_dir(temp_dir.path())
        .args(["download", "--bucket", "b", "--prefix", "p", "--dest", "out", "--project", "floods"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
