// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Syntax validation
//!
//! A data table maps each language to an external checker command; JSON is
//! checked in-process. A missing checker binary yields `Skipped`, never a
//! failure, so generation keeps working on minimal machines.

use orchestra_adapters::backend::cli::find_on_path;
use orchestra_adapters::backend::process::{run_command, CommandSpec};
use orchestra_adapters::Cancellation;
use orchestra_core::config::Language;
use orchestra_core::SyntaxOutcome;
use std::path::Path;
use std::time::Duration;

const FILE_PLACEHOLDER: &str = "{file}";

#[derive(Debug, Clone)]
struct CheckerRow {
    language: Language,
    command: String,
    args: Vec<String>,
}

fn row(language: Language, command: &str, args: &[&str]) -> CheckerRow {
    CheckerRow {
        language,
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_table() -> Vec<CheckerRow> {
    vec![
        row(Language::Python, "python3", &["-m", "py_compile", "{file}"]),
        row(Language::Javascript, "node", &["--check", "{file}"]),
        row(Language::Typescript, "tsc", &["--noEmit", "{file}"]),
        row(Language::Go, "gofmt", &["-e", "{file}"]),
        row(
            Language::Rust,
            "rustfmt",
            &["--edition", "2021", "--emit", "stdout", "{file}"],
        ),
        row(Language::Yaml, "yamllint", &["-d", "relaxed", "{file}"]),
    ]
}

/// Validator over the configured language set.
pub struct SyntaxValidator {
    table: Vec<CheckerRow>,
    languages: Vec<Language>,
    timeout: Duration,
}

impl SyntaxValidator {
    pub fn new(languages: &[Language]) -> Self {
        Self {
            table: default_table(),
            languages: languages.to_vec(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Replace one language's checker (tests use `true`/`false` stand-ins).
    pub fn override_checker(mut self, language: Language, command: &str, args: &[&str]) -> Self {
        self.table.retain(|r| r.language != language);
        self.table.push(row(language, command, args));
        self
    }

    /// Check one file. Returns the outcome and an optional detail line.
    pub async fn check(
        &self,
        path: &Path,
        cancel: &Cancellation,
    ) -> (SyntaxOutcome, Option<String>) {
        let display = path.display().to_string();
        let Some(language) = Language::from_path(&display) else {
            return (SyntaxOutcome::Skipped, Some("unknown language".into()));
        };
        if !self.languages.contains(&language) {
            return (
                SyntaxOutcome::Skipped,
                Some(format!("{language} not in configured languages")),
            );
        }
        if language == Language::Json {
            return match std::fs::read_to_string(path) {
                Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                    Ok(_) => (SyntaxOutcome::Passed, None),
                    Err(e) => (SyntaxOutcome::Failed, Some(e.to_string())),
                },
                Err(e) => (SyntaxOutcome::Failed, Some(e.to_string())),
            };
        }

        let Some(checker) = self.table.iter().find(|r| r.language == language) else {
            return (SyntaxOutcome::Skipped, Some("no checker configured".into()));
        };
        if find_on_path(&checker.command).is_none() {
            return (
                SyntaxOutcome::Skipped,
                Some(format!("checker '{}' not installed", checker.command)),
            );
        }

        let spec = CommandSpec {
            command: checker.command.clone(),
            args: checker
                .args
                .iter()
                .map(|a| a.replace(FILE_PLACEHOLDER, &display))
                .collect(),
            env: Vec::new(),
            cwd: None,
            stdin: None,
            timeout: self.timeout,
        };
        match run_command(spec, cancel).await {
            Ok(output) if output.exit_code == Some(0) => (SyntaxOutcome::Passed, None),
            Ok(output) => {
                let detail = output
                    .stderr
                    .lines()
                    .chain(output.stdout.lines())
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string);
                (SyntaxOutcome::Failed, detail)
            }
            Err(e) => (SyntaxOutcome::Skipped, Some(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "syntax_tests.rs"]
mod tests;
