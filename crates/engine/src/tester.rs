// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test runner integration
//!
//! A failing test run is non-terminal for the session: it produces a
//! `test:complete` event with `success=false` and a warning, nothing more.

use orchestra_adapters::backend::process::{run_command, CommandSpec};
use orchestra_adapters::Cancellation;
use std::path::Path;
use std::time::Duration;

/// Outcome of one test run.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub command: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Last few lines of combined output, for the summary.
    pub output_tail: String,
}

/// Autodetect the project's test command by file-existence probes.
pub fn detect_test_command(project_root: &Path) -> Option<String> {
    let probes: [(&str, &str); 5] = [
        ("package.json", "npm test"),
        ("Cargo.toml", "cargo test"),
        ("pyproject.toml", "pytest"),
        ("pytest.ini", "pytest"),
        ("go.mod", "go test ./..."),
    ];
    probes
        .iter()
        .find(|(file, _)| project_root.join(file).exists())
        .map(|(_, command)| command.to_string())
}

/// Run `command` through the shell with a timeout.
pub async fn run_tests(
    project_root: &Path,
    command: &str,
    timeout: Duration,
    cancel: &Cancellation,
) -> TestOutcome {
    let spec = CommandSpec {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), command.to_string()],
        env: Vec::new(),
        cwd: Some(project_root.to_path_buf()),
        stdin: None,
        timeout,
    };
    match run_command(spec, cancel).await {
        Ok(output) => {
            let success = output.exit_code == Some(0) && !output.timed_out && !output.cancelled;
            TestOutcome {
                command: command.to_string(),
                success,
                duration_ms: output.duration.as_millis() as u64,
                output_tail: tail(&format!("{}{}", output.stdout, output.stderr), 10),
            }
        }
        Err(e) => TestOutcome {
            command: command.to_string(),
            success: false,
            duration_ms: 0,
            output_tail: e.to_string(),
        },
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
