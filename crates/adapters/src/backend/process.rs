// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeout and cancellation
//!
//! Instead of racing promises, the runner selects over child exit, the
//! per-adapter timeout, and the session's cancellation token. On timeout or
//! cancel the child is signalled and awaited for a grace period so no
//! zombie survives a clean shutdown.

use crate::cancel::Cancellation;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Grace period between the kill signal and a forced reap.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// One subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Written to the child's stdin when set; stdin is closed otherwise.
    pub stdin: Option<String>,
    pub timeout: Duration,
}

/// Captured outcome of a subprocess run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub timed_out: bool,
    pub cancelled: bool,
}

/// Run a subprocess, capturing both streams.
///
/// Streams are drained concurrently with the exit wait so a chatty child
/// can never block on a full pipe.
pub async fn run_command(
    spec: CommandSpec,
    cancel: &Cancellation,
) -> Result<CommandOutput, std::io::Error> {
    let start = Instant::now();

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn()?;

    // Stdin is fed from its own task, concurrently with the output drains:
    // a child that echoes while still reading would otherwise fill its
    // output pipe and deadlock against write_all.
    if let Some(input) = spec.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
                // Dropped here, closing the pipe so the child sees EOF.
            });
        }
    }

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let mut timed_out = false;
    let mut cancelled = false;
    let exit_code = tokio::select! {
        status = child.wait() => status?.code(),
        _ = tokio::time::sleep(spec.timeout) => {
            timed_out = true;
            reap(&mut child).await
        }
        _ = cancel.cancelled() => {
            cancelled = true;
            reap(&mut child).await
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
        duration: start.elapsed(),
        timed_out,
        cancelled,
    })
}

/// Signal the child and wait out the grace period.
async fn reap(child: &mut tokio::process::Child) -> Option<i32> {
    if child.start_kill().is_err() {
        // Already exited; collect the status below.
    }
    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        Ok(Err(_)) | Err(_) => None,
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
