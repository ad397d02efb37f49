//! End-to-end CLI tests for the bookmeta binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config, environment and catalog.
fn bookmeta(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bookmeta").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("BOOKMETA_GOOGLE_BOOKS_KEY")
        .env_remove("BOOKMETA_AMAZON_CREDENTIAL_ID")
        .env_remove("BOOKMETA_AMAZON_CREDENTIAL_SECRET");
    for region in ["BR", "US", "UK", "CA"] {
        cmd.env_remove(format!("BOOKMETA_AFFILIATE_TAG_{region}"));
    }
    cmd
}

/// Config whose HTTP providers point at a port nothing listens on.
fn offline_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        r#"
[google_books]
base_url = "http://127.0.0.1:9"
timeout_secs = 2

[open_library]
base_url = "http://127.0.0.1:9"
timeout_secs = 2
"#,
    )
    .unwrap();
    path
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    bookmeta(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve, deduplicate and enrich"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    bookmeta(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bookmeta"));
}

#[test]
fn test_binary_without_subcommand_shows_usage_and_fails() {
    let home = TempDir::new().unwrap();
    bookmeta(home.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    bookmeta(home.path())
        .args(["search", "dune", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_config_show_without_file_uses_defaults() {
    let home = TempDir::new().unwrap();
    bookmeta(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_file = not found (using defaults)"))
        .stdout(predicate::str::contains("[google_books]"));
}

#[test]
fn test_config_show_masks_secrets() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bookmeta.toml");
    fs::write(&config, "[google_books]\napi_key = \"super-secret\"\n").unwrap();

    bookmeta(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_file = loaded"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("super-secret").not());
}

#[test]
fn test_missing_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    bookmeta(home.path())
        .args(["--config", "/nonexistent/bookmeta.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read config file"));
}

#[test]
fn test_links_without_affiliate_tags_fails() {
    let home = TempDir::new().unwrap();
    let config = offline_config(home.path());
    bookmeta(home.path())
        .arg("--config")
        .arg(&config)
        .args(["links", "--asin", "B00ABC1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No affiliate tags configured"));
}

#[test]
fn test_links_with_tag_from_environment() {
    let home = TempDir::new().unwrap();
    let config = offline_config(home.path());
    bookmeta(home.path())
        .env("BOOKMETA_AFFILIATE_TAG_US", "bookmeta-20")
        .arg("--config")
        .arg(&config)
        .args(["links", "--asin", "B00ABC1234", "--region", "US,BR"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://www.amazon.com/dp/B00ABC1234?tag=bookmeta-20",
        ))
        .stdout(predicate::str::contains("amazon.com.br").not());
}

#[test]
fn test_search_with_unreachable_providers_reports_failure_json() {
    let home = TempDir::new().unwrap();
    let config = offline_config(home.path());
    bookmeta(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-q", "search", "asdkjalksdj-not-a-book"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("\"providers_tried\""));
}

#[test]
fn test_editions_of_unknown_book_fails() {
    let home = TempDir::new().unwrap();
    let config = offline_config(home.path());
    let db = home.path().join("other.db");
    bookmeta(home.path())
        .arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .args(["editions", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot list editions of book 42"));
    assert!(db.exists());
}

#[test]
fn test_enrich_unknown_ids_reports_each_item() {
    let home = TempDir::new().unwrap();
    let config = offline_config(home.path());
    bookmeta(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-q", "enrich", "1", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"requested\": 2"))
        .stdout(predicate::str::contains("\"failed\": 2"))
        .stdout(predicate::str::contains("\"book_id\": 1"))
        .stdout(predicate::str::contains("\"book_id\": 2"));
}
