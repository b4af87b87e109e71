//! Golden tests for verifying JSON output format stability
//!
//! Run with: `cargo test --features golden`

#![cfg(feature = "golden")]

use std::process::Command;

use tempfile::TempDir;

/// Command for the built binary with an isolated, empty config directory
fn sitepush(config_dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sitepush"));
    cmd.env("SITEPUSH_CONFIG_DIR", config_dir.path())
        .env_remove("SITEPUSH_CONFIG")
        .env_remove("SITEPUSH_HTML_CACHE_CONTROL")
        .env_remove("SITEPUSH_IMAGE_CACHE_CONTROL")
        .env_remove("SITEPUSH_OTHER_CACHE_CONTROL");
    cmd
}

#[test]
fn test_classify_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = sitepush(&temp_dir)
        .args([
            "classify",
            "index.html",
            "INDEX.HTML",
            "logo.svg",
            "logo.SVG",
            "app.3f2a1.js",
            "--json",
        ])
        .output()
        .expect("Failed to execute sitepush");

    assert!(output.status.success(), "Command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");

    insta::assert_json_snapshot!("classify_json", json);
}

#[test]
fn test_upload_without_bucket_is_usage_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = sitepush(&temp_dir)
        .env_remove("SITEPUSH_BUCKET")
        .args(["upload", "--json"])
        .output()
        .expect("Failed to execute sitepush");

    assert_eq!(output.status.code(), Some(2), "Exit code should be 2 (USAGE)");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let json: serde_json::Value =
        serde_json::from_str(&stderr).expect("Error output should be valid JSON");
    assert_eq!(json["error"], "Configuration error: Bucket name is required");
}
