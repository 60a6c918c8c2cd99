// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cancel::Cancellation;
use orchestra_core::config::BackendEntry;
use std::collections::HashMap;

fn entry(command: &str, args: &[&str]) -> BackendEntry {
    BackendEntry {
        id: "fakecli".to_string(),
        provider: "anthropic".to_string(),
        model: "test-model".to_string(),
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        prompt: PromptDelivery::Arg,
        env: HashMap::new(),
        credential_env: None,
        requires_credential: false,
        base_url_env: None,
        timeout_ms: 5_000,
        context_window: 8_000,
        cost_per_1k_tokens: 0.0,
    }
}

fn request<'a>(prompt: &'a str, cancel: &'a Cancellation) -> ExecuteRequest<'a> {
    ExecuteRequest {
        prompt,
        output_path: None,
        working_dir: None,
        cancel,
    }
}

#[tokio::test]
async fn echoes_prompt_as_final_arg() {
    let backend = CliBackend::new(entry("echo", &[]));
    let cancel = Cancellation::new();
    let result = backend.execute(request("hello world", &cancel)).await.unwrap();
    assert_eq!(result.output.trim(), "hello world");
}

#[tokio::test]
async fn substitutes_prompt_placeholder() {
    let backend = CliBackend::new(entry("echo", &["prefix", "{prompt}"]));
    let cancel = Cancellation::new();
    let result = backend.execute(request("payload", &cancel)).await.unwrap();
    assert_eq!(result.output.trim(), "prefix payload");
}

#[tokio::test]
async fn delivers_prompt_via_stdin() {
    let mut entry = entry("cat", &[]);
    entry.prompt = PromptDelivery::Stdin;
    let backend = CliBackend::new(entry);
    let cancel = Cancellation::new();
    let result = backend.execute(request("stdin payload", &cancel)).await.unwrap();
    assert_eq!(result.output, "stdin payload");
}

#[tokio::test]
async fn writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested/out.txt");
    let backend = CliBackend::new(entry("echo", &["generated body"]));
    let cancel = Cancellation::new();
    let result = backend
        .execute(ExecuteRequest {
            prompt: "",
            output_path: Some(&out),
            working_dir: None,
            cancel: &cancel,
        })
        .await
        .unwrap();
    assert_eq!(result.output_path.as_deref(), Some(out.as_path()));
    assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "generated body");
}

#[tokio::test]
async fn classifies_rate_limit_from_stderr() {
    let backend = CliBackend::new(entry("sh", &["-c", "echo 'rate limit exceeded' >&2; exit 1"]));
    let cancel = Cancellation::new();
    let err = backend.execute(request("x", &cancel)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimit);
    assert!(err.message.contains("rate limit"));
}

#[tokio::test]
async fn classifies_context_exceeded_even_on_exit_zero() {
    let backend = CliBackend::new(entry("sh", &["-c", "echo 'prompt is too long'"]));
    let cancel = Cancellation::new();
    let err = backend.execute(request("x", &cancel)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ContextExceeded);
}

#[tokio::test]
async fn classifies_timeout() {
    let mut entry = entry("sleep", &["30"]);
    entry.timeout_ms = 50;
    let backend = CliBackend::new(entry);
    let cancel = Cancellation::new();
    let err = backend.execute(request("x", &cancel)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn nonzero_exit_without_stdout_is_api_error() {
    let backend = CliBackend::new(entry("sh", &["-c", "echo 'boom' >&2; exit 2"]));
    let cancel = Cancellation::new();
    let err = backend.execute(request("x", &cancel)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ApiError);
    assert_eq!(err.message, "boom");
}

#[tokio::test]
async fn nonzero_exit_with_stdout_succeeds() {
    let backend = CliBackend::new(entry("sh", &["-c", "echo 'useful output'; exit 1"]));
    let cancel = Cancellation::new();
    let result = backend.execute(request("x", &cancel)).await.unwrap();
    assert_eq!(result.output.trim(), "useful output");
}

#[tokio::test]
async fn missing_binary_is_unavailable() {
    let backend = CliBackend::new(entry("definitely-not-a-real-backend-binary", &[]));
    let reason = backend.availability().await.unwrap_err();
    assert!(reason.contains("not found on PATH"));
    assert!(!backend.is_available().await);
}

#[tokio::test]
async fn present_binary_is_available() {
    let backend = CliBackend::new(entry("echo", &[]));
    assert!(backend.availability().await.is_ok());
}

#[tokio::test]
async fn missing_required_credential_is_unavailable() {
    let mut entry = entry("echo", &[]);
    entry.credential_env = Some("ORCHESTRA_TEST_DEFINITELY_UNSET_KEY".to_string());
    entry.requires_credential = true;
    let backend = CliBackend::new(entry);
    let reason = backend.availability().await.unwrap_err();
    assert!(reason.contains("ORCHESTRA_TEST_DEFINITELY_UNSET_KEY"));
}

#[test]
fn info_reflects_entry() {
    let backend = CliBackend::new(entry("echo", &[]));
    let info = backend.info();
    assert_eq!(info.name, "fakecli");
    assert_eq!(info.provider, "anthropic");
    assert_eq!(info.model, "test-model");
}

#[test]
fn find_on_path_resolves_sh() {
    assert!(find_on_path("sh").is_some());
    assert!(find_on_path("definitely-not-a-real-backend-binary").is_none());
}
