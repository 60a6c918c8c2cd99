// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit outcome parsing

use crate::prompts::{AUDIT_APPROVED_MARKER, AUDIT_ISSUE_MARKER};
use serde::{Deserialize, Serialize};

/// One reported problem, attributed to a file when the auditor named one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub approved: bool,
    #[serde(default)]
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    /// Paths with at least one attributed issue; unattributed issues flag
    /// every known path, since any file could be the culprit.
    pub fn flagged_paths(&self, known_paths: &[String]) -> Vec<String> {
        let attributed: Vec<String> = self
            .issues
            .iter()
            .filter_map(|issue| issue.path.clone())
            .collect();
        if attributed.is_empty() && !self.issues.is_empty() {
            return known_paths.to_vec();
        }
        let mut flagged = Vec::new();
        for path in known_paths {
            if attributed.iter().any(|a| a == path) {
                flagged.push(path.clone());
            }
        }
        flagged
    }

    /// Stable form folded into the convergence fingerprint.
    pub fn fingerprint_text(&self) -> String {
        let mut lines: Vec<String> = self
            .issues
            .iter()
            .map(|issue| {
                format!(
                    "{}:{}",
                    issue.path.as_deref().unwrap_or("*"),
                    issue.description.to_lowercase()
                )
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

/// Parse the auditor's reply.
///
/// `APPROVED` with no issue lines approves; `ISSUE: <path>: <description>`
/// lines reject. Anything unrecognizable rejects with a generic issue so a
/// confused auditor can never silently approve.
pub fn parse_audit(text: &str, known_paths: &[String]) -> AuditReport {
    let mut issues = Vec::new();
    let mut approved_marker = false;

    for line in text.lines() {
        let trimmed = line.trim().trim_start_matches(['-', '*']).trim_start();
        if trimmed.eq_ignore_ascii_case(AUDIT_APPROVED_MARKER) {
            approved_marker = true;
            continue;
        }
        let Some(rest) = strip_issue_marker(trimmed) else {
            continue;
        };
        let (path, description) = split_issue(rest, known_paths);
        issues.push(AuditIssue { path, description });
    }

    if issues.is_empty() && !approved_marker {
        issues.push(AuditIssue {
            path: None,
            description: "unrecognized auditor response".to_string(),
        });
    }

    AuditReport {
        approved: issues.is_empty(),
        issues,
    }
}

fn strip_issue_marker(line: &str) -> Option<&str> {
    let upper = line.to_uppercase();
    if upper.starts_with(AUDIT_ISSUE_MARKER) {
        Some(line[AUDIT_ISSUE_MARKER.len()..].trim_start())
    } else {
        None
    }
}

fn split_issue(rest: &str, known_paths: &[String]) -> (Option<String>, String) {
    // Preferred shape: `<path>: <description>` with a known path.
    if let Some((head, tail)) = rest.split_once(':') {
        let head = head.trim().trim_matches('`');
        if known_paths.iter().any(|p| p == head) {
            return (Some(head.to_string()), tail.trim().to_string());
        }
    }
    // Fallback: any known path mentioned anywhere in the line.
    for path in known_paths {
        if rest.contains(path.as_str()) {
            return (Some(path.clone()), rest.trim().to_string());
        }
    }
    (None, rest.trim().to_string())
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
