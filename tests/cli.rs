//! End-to-end tests for the pagewatch binary.

#![allow(deprecated)] // cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pagewatch(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pagewatch").unwrap();
    cmd.env("PAGEWATCH_HOME", home)
        .env_remove("RUST_LOG")
        .current_dir(home);
    cmd
}

fn seed(home: &Path, urls: &[&str]) {
    let mut map = serde_json::Map::new();
    for url in urls {
        map.insert(
            (*url).to_string(),
            serde_json::json!({
                "fingerprint": "0000",
                "lastCheckedAt": "2024-05-01T12:00:00Z",
                "lastChangedAt": "2024-05-01T12:00:00Z",
                "checkCount": 4
            }),
        );
    }
    fs::write(
        home.join("pages.json"),
        serde_json::to_string_pretty(&map).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    pagewatch(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("monitor"));
}

#[test]
fn test_watch_help_shows_interval() {
    let home = TempDir::new().unwrap();
    pagewatch(home.path())
        .args(["watch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--interval"));
}

#[test]
fn test_zero_interval_rejected() {
    let home = TempDir::new().unwrap();
    pagewatch(home.path())
        .args(["monitor", "--interval", "0"])
        .assert()
        .failure();
}

#[test]
fn test_list_empty() {
    let dir = TempDir::new().unwrap();
    let home = dir.path().join("fresh");
    fs::create_dir(&home).unwrap();
    pagewatch(&home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No URLs monitored yet"));
}

#[test]
fn test_list_shows_ordinals() {
    let home = TempDir::new().unwrap();
    seed(home.path(), &["https://b.example", "https://a.example"]);
    pagewatch(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"1\s+https://b\.example").unwrap())
        .stdout(predicate::str::is_match(r"2\s+https://a\.example").unwrap())
        .stdout(predicate::str::contains("Total: 2 URL(s)"));
}

#[test]
fn test_remove_by_ordinal() {
    let home = TempDir::new().unwrap();
    seed(home.path(), &["https://b.example", "https://a.example"]);
    pagewatch(home.path())
        .args(["remove", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed: https://b.example"));

    let saved = fs::read_to_string(home.path().join("pages.json")).unwrap();
    assert!(!saved.contains("https://b.example"));
    assert!(saved.contains("https://a.example"));
}

#[test]
fn test_errors_are_reported_with_zero_exit() {
    let home = TempDir::new().unwrap();
    seed(home.path(), &["https://a.example"]);
    pagewatch(home.path())
        .args(["remove", "https://missing.example"])
        .assert()
        .success()
        .stdout(predicate::str::contains("URL not found: https://missing.example"));

    pagewatch(home.path())
        .args(["add", "https://a.example"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already monitored"));
}

#[test]
fn test_corrupt_state_is_treated_as_empty() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("pages.json"), "{ broken").unwrap();
    pagewatch(home.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("No URLs to check"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_then_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
        .mount(&server)
        .await;
    let url = format!("{}/page", server.uri());
    let home = TempDir::new().unwrap();

    pagewatch(home.path())
        .args(["add", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added and initialized"));

    pagewatch(home.path())
        .args(["check", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no change"));

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.path().join("pages.json")).unwrap())
            .unwrap();
    assert_eq!(saved[&url]["checkCount"], 2);
}
