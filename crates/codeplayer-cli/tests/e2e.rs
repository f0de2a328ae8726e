//! End-to-end tests for Code Player CLI commands.
//!
//! These tests verify that the CLI produces expected output
//! when run against real project directories.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a temporary project directory with the given files.
struct TestProject {
    temp_dir: TempDir,
}

impl TestProject {
    fn new(files: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        for (name, contents) in files {
            fs::write(temp_dir.path().join(name), contents).expect("Failed to write source");
        }
        Self { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn arg(&self) -> &str {
        self.path().to_str().unwrap()
    }
}

fn codeplayer() -> Command {
    Command::cargo_bin("codeplayer").expect("Failed to find codeplayer binary")
}

// =============================================================================
// Run
// =============================================================================

#[test]
fn test_run_nonexistent_directory() {
    codeplayer()
        .args(["run", "/nonexistent/project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_run_prints_console() {
    let project = TestProject::new(&[
        ("index.html", "<h1>Hello</h1>"),
        ("script.js", "console.log('hi'); console.warn('careful'); console.log({ a: 1 })"),
    ]);

    let output = codeplayer()
        .args(["run", project.arg()])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "codeplayer run should succeed. stderr: {}", stderr);
    assert!(stdout.contains("› hi"), "stdout: {}", stdout);
    assert!(stdout.contains("⚠ careful"), "stdout: {}", stdout);
    assert!(stdout.contains("\"a\": 1"), "stdout: {}", stdout);
    assert!(stdout.contains("3 console records"), "stdout: {}", stdout);
    assert!(stdout.contains("Completed"), "stdout: {}", stdout);
}

#[test]
fn test_run_script_only_project() {
    let project = TestProject::new(&[("script.js", "console.log(\"hi\")")]);

    codeplayer()
        .args(["run", project.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("› hi").and(predicate::str::contains("1 console records")));
}

#[test]
fn test_run_empty_project() {
    let project = TestProject::new(&[]);

    codeplayer()
        .args(["run", project.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No console output yet..."));
}

#[test]
fn test_run_reports_uncaught_errors() {
    let project = TestProject::new(&[("script.js", "undefinedFunction()")]);

    codeplayer()
        .args(["run", project.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("✖ Uncaught"));
}

#[test]
fn test_run_with_custom_file_names() {
    let project = TestProject::new(&[("app.js", "console.info('custom')")]);

    codeplayer()
        .args(["run", project.arg(), "--js", "app.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ℹ custom"));
}

// =============================================================================
// Export
// =============================================================================

#[test]
fn test_export_to_stdout() {
    let project = TestProject::new(&[("index.html", "<p>exported</p>")]);

    codeplayer()
        .args(["export", project.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("<!DOCTYPE html>").and(predicate::str::contains("<p>exported</p>")));
}

#[test]
fn test_export_static_to_file() {
    let project = TestProject::new(&[("index.html", "<p>mail</p>")]);
    let output = project.path().join("out.html");

    codeplayer()
        .args(["export", project.arg(), "--static", "-o", output.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Exported"));

    let html = fs::read_to_string(&output).unwrap();
    assert!(html.contains("<p>mail</p>"));
    assert!(html.contains("/* No CSS */"));
    assert!(!html.contains("shouldCapture"));
}

// =============================================================================
// Help
// =============================================================================

#[test]
fn test_help() {
    codeplayer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sandboxed live preview"));
}
