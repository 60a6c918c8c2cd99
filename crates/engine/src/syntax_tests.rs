// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchestra_core::config::Language;
use orchestra_core::SyntaxOutcome;

fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn json_is_checked_in_process() {
    let dir = tempfile::tempdir().unwrap();
    let validator = SyntaxValidator::new(&Language::ALL);
    let cancel = Cancellation::new();

    let good = write(&dir, "good.json", r#"{"a": [1, 2]}"#);
    assert_eq!(validator.check(&good, &cancel).await.0, SyntaxOutcome::Passed);

    let bad = write(&dir, "bad.json", r#"{"a": ["#);
    let (outcome, detail) = validator.check(&bad, &cancel).await;
    assert_eq!(outcome, SyntaxOutcome::Failed);
    assert!(detail.is_some());
}

#[tokio::test]
async fn unknown_extension_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let validator = SyntaxValidator::new(&Language::ALL);
    let path = write(&dir, "notes.txt", "whatever");
    let (outcome, _) = validator.check(&path, &Cancellation::new()).await;
    assert_eq!(outcome, SyntaxOutcome::Skipped);
}

#[tokio::test]
async fn disabled_language_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let validator = SyntaxValidator::new(&[Language::Json]);
    let path = write(&dir, "mod.py", "print('hi')");
    let (outcome, detail) = validator.check(&path, &Cancellation::new()).await;
    assert_eq!(outcome, SyntaxOutcome::Skipped);
    assert!(detail.unwrap().contains("python"));
}

#[tokio::test]
async fn external_checker_pass_and_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "a.go", "package main");
    let cancel = Cancellation::new();

    let passing = SyntaxValidator::new(&Language::ALL).override_checker(
        Language::Go,
        "true",
        &["{file}"],
    );
    assert_eq!(passing.check(&path, &cancel).await.0, SyntaxOutcome::Passed);

    let failing = SyntaxValidator::new(&Language::ALL).override_checker(
        Language::Go,
        "false",
        &["{file}"],
    );
    assert_eq!(failing.check(&path, &cancel).await.0, SyntaxOutcome::Failed);
}

#[tokio::test]
async fn missing_checker_binary_skips() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "a.go", "package main");
    let validator = SyntaxValidator::new(&Language::ALL).override_checker(
        Language::Go,
        "no-such-checker-binary",
        &["{file}"],
    );
    let (outcome, detail) = validator.check(&path, &Cancellation::new()).await;
    assert_eq!(outcome, SyntaxOutcome::Skipped);
    assert!(detail.unwrap().contains("not installed"));
}

#[tokio::test]
async fn python_checker_when_available() {
    let dir = tempfile::tempdir().unwrap();
    if find_on_path("python3").is_none() {
        return;
    }
    let validator = SyntaxValidator::new(&Language::ALL);
    let cancel = Cancellation::new();

    let good = write(&dir, "ok.py", "x = 1\n");
    assert_eq!(validator.check(&good, &cancel).await.0, SyntaxOutcome::Passed);

    let bad = write(&dir, "broken.py", "def f(:\n");
    assert_eq!(validator.check(&bad, &cancel).await.0, SyntaxOutcome::Failed);
}
