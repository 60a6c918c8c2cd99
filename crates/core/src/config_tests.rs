// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.execution.max_concurrency, 3);
    assert_eq!(config.execution.max_iterations, 3);
    assert_eq!(config.recovery.max_recovery_attempts, 2);
    assert!(config.recovery.auto_revert_on_failure);
    assert_eq!(config.agents.architect[0], "claude");
    assert_eq!(config.languages.len(), 7);
}

#[test]
fn partial_document_fills_defaults() {
    let raw = r#"{
        "execution": {"parallel": true, "maxConcurrency": 8},
        "git": {"autoCommit": true},
        "tui": {"maxRecoveryAttempts": 5}
    }"#;
    let config: Config = serde_json::from_str(raw).unwrap();
    assert!(config.execution.parallel);
    assert_eq!(config.execution.max_concurrency, 8);
    assert_eq!(config.execution.max_iterations, 3);
    assert!(config.git.auto_commit);
    assert_eq!(config.git.commit_message_template, "orchestra: {task}");
    assert_eq!(config.recovery.max_recovery_attempts, 5);
    assert_eq!(config.recovery.recovery_timeout_minutes, 10);
}

#[yare::parameterized(
    zero_concurrency = { r#"{"execution": {"maxConcurrency": 0}}"# },
    zero_iterations = { r#"{"execution": {"maxIterations": 0}}"# },
    empty_chain = { r#"{"agents": {"executor": []}}"# },
)]
fn invalid_documents_are_rejected(raw: &str) {
    let config: Config = serde_json::from_str(raw).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn agent_chains_select_per_role() {
    let raw = r#"{"agents": {"auditor": ["gemini", "claude"]}}"#;
    let config: Config = serde_json::from_str(raw).unwrap();
    assert_eq!(
        config.agents.for_role(crate::role::AgentRole::Auditor),
        ["gemini", "claude"]
    );
    assert_eq!(config.agents.for_role(crate::role::AgentRole::Executor).len(), 4);
}

#[test]
fn backend_entry_defaults() {
    let raw = r#"{
        "id": "local",
        "provider": "local",
        "model": "llama",
        "command": "llama-cli"
    }"#;
    let entry: BackendEntry = serde_json::from_str(raw).unwrap();
    assert_eq!(entry.prompt, PromptDelivery::Arg);
    assert_eq!(entry.timeout_ms, 300_000);
    assert_eq!(entry.context_window, 128_000);
}

#[yare::parameterized(
    python = { "pkg/mod.py", Some(Language::Python) },
    typescript = { "web/app.tsx", Some(Language::Typescript) },
    yaml = { "ci.yml", Some(Language::Yaml) },
    unknown = { "notes.txt", None },
    no_ext = { "Makefile", None },
)]
fn language_from_path(path: &str, expected: Option<Language>) {
    assert_eq!(Language::from_path(path), expected);
}

#[test]
fn load_or_default_without_file() {
    let dir = std::env::temp_dir().join("orchestra-config-test-missing");
    let _ = std::fs::create_dir_all(&dir);
    let (config, path) = Config::load_or_default(&dir).unwrap();
    assert!(path.is_none());
    config.validate().unwrap();
}

#[test]
fn default_json_parses_back() {
    let raw = Config::default_json();
    let config: Config = serde_json::from_str(&raw).unwrap();
    config.validate().unwrap();
}
