// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git commit integration
//!
//! Like the test runner, a failing commit is non-terminal: it produces a
//! `commit:complete` event with `success=false` and a warning.

use orchestra_adapters::backend::process::{run_command, CommandSpec};
use orchestra_adapters::Cancellation;
use std::path::Path;
use std::time::Duration;

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of the commit step.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub success: bool,
    pub message: String,
    /// Commit hash on success.
    pub commit: Option<String>,
    pub detail: Option<String>,
}

/// Expand the `{task}` placeholder of the configured template.
pub fn render_commit_message(template: &str, task: &str) -> String {
    template.replace("{task}", task)
}

async fn git(
    project_root: &Path,
    args: &[&str],
    cancel: &Cancellation,
) -> Result<(bool, String, String), String> {
    let spec = CommandSpec {
        command: "git".to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: Vec::new(),
        cwd: Some(project_root.to_path_buf()),
        stdin: None,
        timeout: GIT_TIMEOUT,
    };
    let output = run_command(spec, cancel).await.map_err(|e| e.to_string())?;
    Ok((
        output.exit_code == Some(0),
        output.stdout,
        output.stderr,
    ))
}

/// Stage everything and commit with `message`, optionally on `branch`.
pub async fn commit_all(
    project_root: &Path,
    message: &str,
    branch: Option<&str>,
    cancel: &Cancellation,
) -> CommitOutcome {
    let fail = |detail: String| CommitOutcome {
        success: false,
        message: message.to_string(),
        commit: None,
        detail: Some(detail),
    };

    if let Some(branch) = branch {
        match git(project_root, &["checkout", "-B", branch], cancel).await {
            Ok((true, _, _)) => {}
            Ok((false, _, stderr)) => return fail(stderr),
            Err(e) => return fail(e),
        }
    }
    match git(project_root, &["add", "-A"], cancel).await {
        Ok((true, _, _)) => {}
        Ok((false, _, stderr)) => return fail(stderr),
        Err(e) => return fail(e),
    }
    match git(project_root, &["commit", "-m", message], cancel).await {
        Ok((true, _, _)) => {}
        Ok((false, stdout, stderr)) => {
            return fail(if stderr.trim().is_empty() { stdout } else { stderr })
        }
        Err(e) => return fail(e),
    }

    let commit = match git(project_root, &["rev-parse", "HEAD"], cancel).await {
        Ok((true, stdout, _)) => Some(stdout.trim().to_string()),
        _ => None,
    };
    CommitOutcome {
        success: true,
        message: message.to_string(),
        commit,
        detail: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_adapters::backend::cli::find_on_path;
    use tempfile::TempDir;

    #[test]
    fn template_expands_task() {
        assert_eq!(
            render_commit_message("orchestra: {task}", "add parser"),
            "orchestra: add parser"
        );
        assert_eq!(render_commit_message("static", "x"), "static");
    }

    async fn init_repo(dir: &TempDir) {
        let cancel = Cancellation::new();
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "Test"],
        ] {
            let (ok, _, _) = git(dir.path(), &args, &cancel).await.unwrap();
            assert!(ok);
        }
    }

    #[tokio::test]
    async fn commits_staged_changes() {
        if find_on_path("git").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(&dir).await;
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let outcome = commit_all(dir.path(), "orchestra: test", None, &Cancellation::new()).await;
        assert!(outcome.success, "{:?}", outcome.detail);
        assert!(outcome.commit.is_some());
    }

    #[tokio::test]
    async fn commit_without_repo_fails_gracefully() {
        if find_on_path("git").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let outcome = commit_all(dir.path(), "msg", None, &Cancellation::new()).await;
        assert!(!outcome.success);
        assert!(outcome.detail.is_some());
    }
}
