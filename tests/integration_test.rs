use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn ghrn(root: &Path, url: &str) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("ghrn"));
    cmd.arg("--root")
        .arg(root)
        .arg("--api-url")
        .arg(url)
        .arg("--web-url")
        .arg(url)
        .env_remove("GITHUB_TOKEN");
    cmd
}

#[test]
fn test_watch_list_unwatch() {
    let mut server = Server::new();
    let url = server.url();

    let _mock_latest = server
        .mock("GET", "/repos/octocat/Hello-World/releases/latest")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("etag", r#"W/"abc""#)
        .with_body(
            r#"{
                "tag_name": "v1.0.0",
                "name": "v1.0.0",
                "html_url": "https://github.com/octocat/Hello-World/releases/v1.0.0",
                "published_at": "2013-02-27T19:35:32Z",
                "author": {
                    "avatar_url": "https://github.com/images/error/octocat_happy.gif",
                    "html_url": "https://github.com/octocat"
                },
                "assets": [
                    { "name": "example.zip", "browser_download_url": "https://example.com/example.zip", "size": 1024 }
                ]
            }"#,
        )
        .create();

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    ghrn(root, &url)
        .arg("watch")
        .arg("octocat/Hello-World")
        .arg("--level")
        .arg("minor")
        .assert()
        .success()
        .stdout(predicate::str::contains("octocat/Hello-World"))
        .stdout(predicate::str::contains("v1.0.0"));

    let synced = std::fs::read_to_string(root.join("sync.json")).unwrap();
    assert!(synced.contains("octocat/Hello-World"));
    let local = std::fs::read_to_string(root.join("local.json")).unwrap();
    assert!(local.contains(r#"W/\"abc\""#));

    ghrn(root, &url)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("v1.0.0"))
        .stdout(predicate::str::contains("2013-02-27 19:35"))
        .stdout(predicate::str::contains("[minor]"));

    ghrn(root, &url)
        .arg("unwatch")
        .arg("octocat/Hello-World")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped watching octocat/Hello-World."));

    ghrn(root, &url)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No repositories watched."));
}

#[test]
fn test_check_reports_new_release() {
    let mut server = Server::new();
    let url = server.url();
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    let first = server
        .mock("GET", "/repos/o/r/releases/latest")
        .with_status(200)
        .with_body(r#"{"tag_name": "v1.0.0", "published_at": "2024-01-01T00:00:00Z"}"#)
        .create();
    ghrn(root, &url).args(["watch", "o/r"]).assert().success();
    first.remove();

    let _second = server
        .mock("GET", "/repos/o/r/releases/latest")
        .with_status(200)
        .with_header("x-ratelimit-remaining", "57")
        .with_body(r#"{"tag_name": "v1.1.0", "published_at": "2024-02-01T00:00:00Z"}"#)
        .create();

    ghrn(root, &url)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 1/1"))
        .stdout(predicate::str::contains("v1.1.0"));

    ghrn(root, &url)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Watching:        1 repositories"))
        .stdout(predicate::str::contains("Rate limit left: 57"))
        .stdout(predicate::str::contains("Authorized:      no"));
}

#[test]
fn test_period_and_status() {
    let server = Server::new();
    let url = server.url();
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    ghrn(root, &url)
        .args(["period", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Check period set to 30 minutes"));

    ghrn(root, &url)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Period:          30 min"));

    ghrn(root, &url)
        .args(["period", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one minute"));

    ghrn(root, &url)
        .args(["period", "18446744073709551615"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at most"));
}

#[test]
fn test_authorize_reads_environment() {
    let server = Server::new();
    let url = server.url();
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    ghrn(root, &url)
        .arg("authorize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_TOKEN"));

    ghrn(root, &url)
        .arg("authorize")
        .env("GITHUB_TOKEN", "ghp_test")
        .assert()
        .success()
        .stdout(predicate::str::contains("Access token saved."));

    ghrn(root, &url)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Authorized:      yes"));
}

#[test]
fn test_watch_rejects_invalid_name() {
    let server = Server::new();
    let url = server.url();
    let root_dir = tempdir().unwrap();

    ghrn(root_dir.path(), &url)
        .args(["watch", "not-a-repo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid repository format"));
}

#[test]
fn test_watch_fails_when_both_sources_fail() {
    let mut server = Server::new();
    let url = server.url();
    let root_dir = tempdir().unwrap();

    let _api = server
        .mock("GET", "/repos/o/r/releases/latest")
        .with_status(500)
        .create();
    let _feed = server
        .mock("GET", "/o/r/releases.atom")
        .with_status(500)
        .create();

    ghrn(root_dir.path(), &url)
        .args(["watch", "o/r"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch release for o/r"));

    ghrn(root_dir.path(), &url)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No repositories watched."));
}
