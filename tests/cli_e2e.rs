//! End-to-end CLI tests for the harvester binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary isolated from any user config file.
fn harvester(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG");
    cmd
}

fn write_record(data_dir: &Path, slug: &str, body: &Value) {
    fs::create_dir_all(data_dir).unwrap();
    fs::write(
        data_dir.join(format!("{slug}.json")),
        serde_json::to_vec_pretty(body).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_binary_help_displays_usage() {
    let dir = TempDir::new().unwrap();
    harvester(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resumable extraction"));
}

#[test]
fn test_binary_version_displays_version() {
    let dir = TempDir::new().unwrap();
    harvester(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("harvester"));
}

#[test]
fn test_binary_requires_subcommand() {
    let dir = TempDir::new().unwrap();
    harvester(dir.path()).assert().failure();
}

#[test]
fn test_binary_conflicting_modes_rejected() {
    let dir = TempDir::new().unwrap();
    harvester(dir.path())
        .args(["scrape", "--slug", "two-sum", "--fix-empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_report_writes_summary_and_json() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("output");
    write_record(
        &data_dir,
        "two-sum",
        &json!({
            "slug": "two-sum",
            "title": "Two Sum",
            "category": "Algorithms",
            "content_html": "<p>x</p>",
            "question": "x",
            "examples": "Example 1:",
            "constraints": "",
            "topics": ["Array"],
            "acceptance_rate": "50%"
        }),
    );
    write_record(&data_dir, "paid", &json!({"slug": "paid"}));

    harvester(dir.path())
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("QUALITY REPORT"))
        .stdout(predicate::str::contains("two-sum: missing constraints"))
        .stdout(predicate::str::contains("Data completeness: 0.0% (0/1)"));

    let report: Value =
        serde_json::from_slice(&fs::read(data_dir.join("_report.json")).unwrap()).unwrap();
    assert_eq!(report["total_records"], 2);
    assert_eq!(report["content_available"], 1);
    assert_eq!(report["empty_constraints"], json!(["two-sum"]));
}

#[test]
fn test_report_uses_data_dir_from_config_file() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("records");
    write_record(&data_dir, "a", &json!({"slug": "a"}));
    let config_dir = dir.path().join("harvester");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!("data_dir = \"{}\"\n", data_dir.display()),
    )
    .unwrap();

    harvester(dir.path()).arg("report").assert().success();

    assert!(data_dir.join("_report.json").exists());
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("harvester");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "delay_min = fast\n").unwrap();

    harvester(dir.path())
        .arg("report")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_retry_failed_without_failure_set_is_noop() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("output");

    harvester(dir.path())
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["scrape", "--retry-failed"])
        .assert()
        .success();
}

#[test]
fn test_inverted_delay_range_fails() {
    let dir = TempDir::new().unwrap();

    harvester(dir.path())
        .arg("--data-dir")
        .arg(dir.path().join("output"))
        .args(["scrape", "--slug", "x", "--delay-min", "5", "--delay-max", "1"])
        .assert()
        .code(1);
}

#[tokio::test]
async fn test_scrape_single_slug_against_mock_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/problems/two-sum/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "question": {
                    "questionFrontendId": "15",
                    "title": "3Sum",
                    "titleSlug": "3sum",
                    "difficulty": "Medium",
                    "content": "<p>Find triplets.</p>",
                    "topicTags": [{"name": "Two Pointers", "slug": "two-pointers"}],
                    "stats": "{\"acRate\": \"36.0%\"}",
                    "categoryTitle": "Algorithms"
                }
            }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("output");

    harvester(dir.path())
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["scrape", "--slug", "3sum", "--base-url"])
        .arg(server.uri())
        .args(["--delay-min", "0", "--delay-max", "0"])
        .assert()
        .success();

    let record: Value =
        serde_json::from_slice(&fs::read(data_dir.join("3sum.json")).unwrap()).unwrap();
    assert_eq!(record["title"], "3Sum");
    assert_eq!(record["acceptance_rate"], "36.0%");
    assert!(!data_dir.join("_failed.json").exists());
}

#[tokio::test]
async fn test_scrape_exits_partial_when_failures_remain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/problems/two-sum/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"question": null}})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("output");

    harvester(dir.path())
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["scrape", "--slug", "gone", "--base-url"])
        .arg(server.uri())
        .args(["-r", "0", "--delay-min", "0", "--delay-max", "0"])
        .assert()
        .code(2);

    let failed: Vec<String> =
        serde_json::from_slice(&fs::read(data_dir.join("_failed.json")).unwrap()).unwrap();
    assert_eq!(failed, vec!["gone"]);
}
