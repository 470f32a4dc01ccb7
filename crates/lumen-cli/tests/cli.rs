//! End-to-end tests for the lumen CLI.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// A script file in a temporary directory.
struct TestScript {
    _temp_dir: TempDir,
    path: PathBuf,
}

impl TestScript {
    fn new(source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("script.rhai");
        fs::write(&path, source).expect("Failed to write script");
        Self {
            _temp_dir: temp_dir,
            path,
        }
    }
}

fn lumen() -> Command {
    let mut cmd = Command::cargo_bin("lumen").expect("binary built");
    cmd.env_remove("LUMEN_MODE")
        .env_remove("LUMEN_UNIT_PREFIX")
        .env_remove("LUMEN_PSEUDO_FILENAME");
    cmd
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_prints_value() {
    let script = TestScript::new("1 + 1");
    lumen()
        .arg("run")
        .arg(&script.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2"));
}

#[test]
fn test_run_prints_output_then_error() {
    let script = TestScript::new("print(\"hello\");\nlet a = 10;\nlet b = 0;\na / b\n");
    lumen()
        .arg("run")
        .arg(&script.path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("hello"))
        .stderr(predicate::str::contains("ArithmeticError"))
        .stderr(predicate::str::contains("this cell:4:"));
}

#[test]
fn test_run_syntax_error() {
    let script = TestScript::new("def x = ; x.y.z");
    lumen()
        .arg("run")
        .arg(&script.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SyntaxError"))
        .stderr(predicate::str::contains("unit_").not());
}

#[test]
fn test_run_missing_file() {
    lumen()
        .arg("run")
        .arg("/nonexistent/script.rhai")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read script"));
}

#[test]
fn test_pseudo_filename_from_env() {
    let script = TestScript::new("throw \"bad\"");
    lumen()
        .env("LUMEN_PSEUDO_FILENAME", "notebook")
        .arg("run")
        .arg(&script.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("(notebook:1:"));
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lumen.json");
    fs::write(&config, r#"{ "pseudo_filename": "from config" }"#).unwrap();
    let script = TestScript::new("throw \"bad\"");

    lumen()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&script.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("(from config:1:"));
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lumen.json");
    fs::write(&config, r#"{ "unit_prefix": "9" }"#).unwrap();
    let script = TestScript::new("1");

    lumen()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&script.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

// =============================================================================
// repl
// =============================================================================

#[test]
fn test_repl_keeps_variables_between_lines() {
    lumen()
        .arg("--local-dev")
        .arg("repl")
        .write_stdin("let x = 40;\nx + 2\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("42"))
        .stdout(predicate::str::contains("local-dev mode"));
}

#[test]
fn test_repl_reports_errors_and_continues() {
    lumen()
        .arg("repl")
        .write_stdin("undefined_var\n\"still here\"\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("still here"))
        .stderr(predicate::str::contains("undefined_var"));
}
