// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan parsing
//!
//! A plan is a markdown artifact produced by the Architect. File directives
//! come in two accepted shapes:
//!
//! ```text
//! ## FILE: src/parser.rs
//! Tokenizer and recursive-descent parser.
//!
//! - `src/main.rs` — CLI entry point
//! ```
//!
//! The kernel only relies on the ordered path list; everything else in the
//! plan is narrative for the human approving it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static HEADING_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{2,3}\s*FILE:\s*(\S+)\s*$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static BULLET_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[-*]\\s+`([^`]+)`\\s*(?:[-—–:]\\s*(.*))?$")
        .expect("constant regex pattern is valid")
});

/// One file directive: a target path and its intended contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDirective {
    pub path: String,
    #[serde(default)]
    pub summary: String,
}

/// Extract the ordered file directives from plan text.
///
/// Duplicate paths keep their first directive. Heading directives absorb
/// the following narrative lines as their summary; bullets carry theirs
/// inline.
pub fn parse_plan(text: &str) -> Vec<FileDirective> {
    fn push(directives: &mut Vec<FileDirective>, path: String, lines: Vec<String>) {
        if !directives.iter().any(|d| d.path == path) {
            directives.push(FileDirective {
                path,
                summary: lines.join(" ").trim().to_string(),
            });
        }
    }

    let mut directives: Vec<FileDirective> = Vec::new();
    let mut open: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if let Some(captures) = HEADING_DIRECTIVE.captures(line) {
            if let Some((path, lines)) = open.take() {
                push(&mut directives, path, lines);
            }
            open = Some((captures[1].to_string(), Vec::new()));
            continue;
        }
        if let Some(captures) = BULLET_DIRECTIVE.captures(line) {
            if let Some((path, lines)) = open.take() {
                push(&mut directives, path, lines);
            }
            let summary = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            push(&mut directives, captures[1].to_string(), vec![summary]);
            continue;
        }
        if open.is_some() && line.starts_with('#') {
            // Narrative resumes at the next heading; close the directive.
            if let Some((path, lines)) = open.take() {
                push(&mut directives, path, lines);
            }
        } else if let Some((_, lines)) = open.as_mut() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }
    if let Some((path, lines)) = open.take() {
        push(&mut directives, path, lines);
    }
    directives
}

/// The ordered path list of a plan.
pub fn plan_paths(text: &str) -> Vec<String> {
    parse_plan(text).into_iter().map(|d| d.path).collect()
}

/// Render directives back to plan text in the heading form.
pub fn serialize_plan(directives: &[FileDirective]) -> String {
    let mut out = String::new();
    for directive in directives {
        out.push_str("## FILE: ");
        out.push_str(&directive.path);
        out.push('\n');
        if !directive.summary.is_empty() {
            out.push('\n');
            out.push_str(&directive.summary);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
