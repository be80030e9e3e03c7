//! Common test helpers for CLI tests.

#![allow(dead_code)] // Functions used across different test binaries

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Replace the temp directory with `<TEMPDIR>` and report ids with a stable
/// placeholder.
pub fn normalize_output(output: &str, dir: &Path) -> String {
    let dir_str = dir.display().to_string();
    let normalized = output.replace(&dir_str, "<TEMPDIR>");

    let id_pattern = regex::Regex::new(r"(INC|PTW)-\d{14}-[0-9a-f]{8}").unwrap();
    id_pattern.replace_all(&normalized, "$1-<ID>").to_string()
}

/// Run one ptwctl command in `dir`
pub fn ptwctl(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ptwctl"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run ptwctl")
}

/// Run ptwctl commands in a directory and capture the combined transcript.
pub fn run_commands(dir: &Path, commands: &[&[&str]]) -> String {
    let mut output = String::new();

    for args in commands {
        output.push_str(&format!("$ ptwctl {}\n", args.join(" ")));

        let result = ptwctl(dir, args);
        let stdout = String::from_utf8_lossy(&result.stdout);
        let stderr = String::from_utf8_lossy(&result.stderr);

        if !stdout.is_empty() {
            output.push_str(&stdout);
            if !stdout.ends_with('\n') {
                output.push('\n');
            }
        }
        if !stderr.is_empty() {
            output.push_str(&stderr);
            if !stderr.ends_with('\n') {
                output.push('\n');
            }
        }

        output.push_str(&format!("exit: {}\n\n", result.status.code().unwrap_or(-1)));
    }

    normalize_output(&output, dir)
}

/// Initialize a ptwctl project in a temp directory
pub fn init_project() -> TempDir {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let result = ptwctl(temp_dir.path(), &["init"]);
    assert!(result.status.success(), "ptwctl init failed");
    temp_dir
}

/// Write a placeholder image for photo capture
pub fn write_image(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, [0xFFu8, 0xD8, 0xFF, 0xE0]).expect("failed to write image");
    path
}
