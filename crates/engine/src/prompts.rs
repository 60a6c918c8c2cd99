// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role prompt assembly
//!
//! Base prompts stay deliberately small; the interesting part is the
//! composition: config prefixes are prepended per role, and recovery runs
//! prepend the Consultant's guidance to the Executor prompt.

use orchestra_core::config::PromptOverrides;
use orchestra_core::{AgentRole, FileDirective};

/// The marker the Auditor uses for a clean report.
pub const AUDIT_APPROVED_MARKER: &str = "APPROVED";

/// Prefix the Auditor uses per found issue.
pub const AUDIT_ISSUE_MARKER: &str = "ISSUE:";

fn prefix_for(overrides: &PromptOverrides, role: AgentRole) -> Option<&str> {
    match role {
        AgentRole::Architect => overrides.architect.as_deref(),
        AgentRole::Executor => overrides.executor.as_deref(),
        AgentRole::Auditor => overrides.auditor.as_deref(),
        AgentRole::Consultant => overrides.consultant.as_deref(),
    }
}

fn compose(overrides: &PromptOverrides, role: AgentRole, body: String) -> String {
    match prefix_for(overrides, role) {
        Some(prefix) => format!("{prefix}\n\n{body}"),
        None => body,
    }
}

/// Architect: turn the task into a plan of `## FILE:` directives.
pub fn architect(overrides: &PromptOverrides, task: &str) -> String {
    let body = format!(
        "You are the architect. Produce an implementation plan for the task \
         below. For every file to create or modify, emit a directive line \
         `## FILE: <relative/path>` followed by a short description of its \
         intended contents. Do not write any code yet.\n\nTask: {task}\n"
    );
    compose(overrides, AgentRole::Architect, body)
}

/// Executor: generate the contents of one planned file.
pub fn executor(
    overrides: &PromptOverrides,
    task: &str,
    directive: &FileDirective,
    guidance: Option<&str>,
) -> String {
    let mut body = String::new();
    if let Some(guidance) = guidance {
        body.push_str("Guidance from a previous failed attempt:\n");
        body.push_str(guidance);
        body.push_str("\n\n");
    }
    body.push_str(&format!(
        "You are the executor. Write the complete contents of `{path}`. \
         Output only the file body, no fences and no commentary.\n\n\
         Task: {task}\nFile purpose: {summary}\n",
        path = directive.path,
        summary = directive.summary,
    ));
    compose(overrides, AgentRole::Executor, body)
}

/// Auditor: review generated files, reply `APPROVED` or `ISSUE:` lines.
pub fn auditor(overrides: &PromptOverrides, task: &str, files: &[(String, String)]) -> String {
    let mut body = format!(
        "You are the auditor. Review the generated files against the task. \
         If everything is correct reply with the single word \
         {AUDIT_APPROVED_MARKER}. Otherwise reply with one line per problem \
         in the form `{AUDIT_ISSUE_MARKER} <path>: <description>`.\n\n\
         Task: {task}\n"
    );
    for (path, content) in files {
        body.push_str(&format!("\n--- {path} ---\n{content}\n"));
    }
    compose(overrides, AgentRole::Auditor, body)
}

/// Consultant: produce targeted guidance for a persistently failing file.
pub fn consultant(
    overrides: &PromptOverrides,
    task: &str,
    path: &str,
    last_error: Option<&str>,
    content: Option<&str>,
) -> String {
    let mut body = format!(
        "You are the consultant. The file `{path}` keeps failing generation \
         or review. Give short, concrete algorithmic guidance the executor \
         can follow.\n\nTask: {task}\n"
    );
    if let Some(error) = last_error {
        body.push_str(&format!("Last error: {error}\n"));
    }
    if let Some(content) = content {
        body.push_str(&format!("Current contents:\n{content}\n"));
    }
    compose(overrides, AgentRole::Consultant, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_prefix_is_prepended() {
        let overrides = PromptOverrides {
            architect: Some("House rules first.".to_string()),
            ..Default::default()
        };
        let prompt = architect(&overrides, "do the thing");
        assert!(prompt.starts_with("House rules first.\n\n"));
        assert!(prompt.contains("do the thing"));
        // Other roles are unaffected.
        let exec = executor(
            &overrides,
            "t",
            &FileDirective {
                path: "a.py".into(),
                summary: "s".into(),
            },
            None,
        );
        assert!(!exec.contains("House rules"));
    }

    #[test]
    fn guidance_is_prepended_to_executor() {
        let overrides = PromptOverrides::default();
        let directive = FileDirective {
            path: "a.py".into(),
            summary: "module".into(),
        };
        let prompt = executor(&overrides, "t", &directive, Some("use a trie"));
        let guidance_pos = prompt.find("use a trie").unwrap();
        let body_pos = prompt.find("You are the executor").unwrap();
        assert!(guidance_pos < body_pos);
    }

    #[test]
    fn auditor_prompt_includes_files() {
        let prompt = auditor(
            &PromptOverrides::default(),
            "t",
            &[("a.py".into(), "print()".into())],
        );
        assert!(prompt.contains("--- a.py ---"));
        assert!(prompt.contains("APPROVED"));
    }
}
