// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec(command: &str, args: &[&str]) -> CommandSpec {
    CommandSpec {
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: Vec::new(),
        cwd: None,
        stdin: None,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn captures_stdout_and_exit_code() {
    let output = run_command(spec("echo", &["hello"]), &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(output.stdout.trim(), "hello");
    assert_eq!(output.exit_code, Some(0));
    assert!(!output.timed_out);
    assert!(!output.cancelled);
}

#[tokio::test]
async fn captures_stderr_and_nonzero_exit() {
    let output = run_command(
        spec("sh", &["-c", "echo oops >&2; exit 3"]),
        &Cancellation::new(),
    )
    .await
    .unwrap();
    assert_eq!(output.stderr.trim(), "oops");
    assert_eq!(output.exit_code, Some(3));
}

#[tokio::test]
async fn feeds_stdin() {
    let mut spec = spec("cat", &[]);
    spec.stdin = Some("from stdin".to_string());
    let output = run_command(spec, &Cancellation::new()).await.unwrap();
    assert_eq!(output.stdout, "from stdin");
}

#[tokio::test]
async fn large_stdin_payload_round_trips() {
    // `cat` echoes while still reading; a payload several times the pipe
    // capacity wedges unless stdin and the output drains run concurrently.
    let mut spec = spec("cat", &[]);
    let payload = "x".repeat(256 * 1024);
    spec.stdin = Some(payload.clone());
    let output = tokio::time::timeout(
        Duration::from_secs(10),
        run_command(spec, &Cancellation::new()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(output.stdout.len(), payload.len());
    assert_eq!(output.exit_code, Some(0));
}

#[tokio::test]
async fn times_out_and_kills() {
    let mut spec = spec("sleep", &["30"]);
    spec.timeout = Duration::from_millis(50);
    let start = std::time::Instant::now();
    let output = run_command(spec, &Cancellation::new()).await.unwrap();
    assert!(output.timed_out);
    assert!(!output.cancelled);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn cancellation_kills_the_child() {
    let cancel = Cancellation::new();
    let killer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        killer.cancel();
    });
    let output = run_command(spec("sleep", &["30"]), &cancel).await.unwrap();
    assert!(output.cancelled);
    assert!(!output.timed_out);
}

#[tokio::test]
async fn missing_binary_is_an_io_error() {
    let result = run_command(
        spec("definitely-not-a-real-binary-by-any-name", &[]),
        &Cancellation::new(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn env_and_cwd_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec("sh", &["-c", "echo $ORCHESTRA_TEST_VAR; pwd"]);
    spec.env = vec![("ORCHESTRA_TEST_VAR".to_string(), "yes".to_string())];
    spec.cwd = Some(dir.path().to_path_buf());
    let output = run_command(spec, &Cancellation::new()).await.unwrap();
    let mut lines = output.stdout.lines();
    assert_eq!(lines.next(), Some("yes"));
    let pwd = lines.next().unwrap_or_default();
    assert!(pwd.contains(dir.path().file_name().unwrap().to_str().unwrap()));
}
