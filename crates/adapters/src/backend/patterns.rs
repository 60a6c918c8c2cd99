// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification tables
//!
//! Rate-limit and context-exceeded detection is a data table of regexes per
//! provider, not hard-coded conditionals: a new backend adds rows. Rows
//! cover English plus Chinese for backends that answer in Chinese.

use orchestra_core::ErrorKind;
use regex::Regex;
use std::sync::LazyLock;

/// Per-provider pattern rows.
pub struct ErrorPatterns {
    rate_limit: Vec<Regex>,
    context_exceeded: Vec<Regex>,
}

const GENERIC_RATE_LIMIT: &[&str] = &[
    r"(?i)rate[ _-]?limit",
    r"(?i)too many requests",
    r"(?i)\b429\b",
    r"(?i)quota (?:was )?exceeded",
    r"(?i)resource[ _]exhausted",
    r"(?i)usage limit reached",
    r"限流",
    r"速率限制",
];

const GENERIC_CONTEXT: &[&str] = &[
    r"(?i)context[ _](?:length|window)",
    r"(?i)maximum context",
    r"(?i)prompt is too long",
    r"(?i)input (?:is )?too long",
    r"(?i)too many tokens",
    r"(?i)context_length_exceeded",
    r"(?i)exceeds? the (?:maximum|model'?s) (?:context|input)",
    r"上下文长度",
];

const ALIBABA_RATE_LIMIT: &[&str] = &[
    r"请求过于频繁",
    r"频率限制",
    r"配额已用完",
    r"(?i)throttling",
];

const ALIBABA_CONTEXT: &[&str] = &[r"超出最大(?:上下文)?长度", r"输入过长", r"内容过长"];

#[allow(clippy::expect_used)]
fn compile(rows: &[&[&str]]) -> Vec<Regex> {
    rows.iter()
        .flat_map(|set| set.iter())
        .map(|row| Regex::new(row).expect("constant regex pattern is valid"))
        .collect()
}

static GENERIC: LazyLock<ErrorPatterns> = LazyLock::new(|| ErrorPatterns {
    rate_limit: compile(&[GENERIC_RATE_LIMIT]),
    context_exceeded: compile(&[GENERIC_CONTEXT]),
});

static ALIBABA: LazyLock<ErrorPatterns> = LazyLock::new(|| ErrorPatterns {
    rate_limit: compile(&[GENERIC_RATE_LIMIT, ALIBABA_RATE_LIMIT]),
    context_exceeded: compile(&[GENERIC_CONTEXT, ALIBABA_CONTEXT]),
});

impl ErrorPatterns {
    /// Pattern set for a provider; unknown providers get the generic rows.
    pub fn for_provider(provider: &str) -> &'static ErrorPatterns {
        match provider {
            "alibaba" => &ALIBABA,
            _ => &GENERIC,
        }
    }

    /// Classify the combined process output. Rate-limit rows are checked
    /// before context rows, matching the adapter contract.
    pub fn classify(&self, stdout: &str, stderr: &str) -> Option<ErrorKind> {
        for pattern in &self.rate_limit {
            if pattern.is_match(stdout) || pattern.is_match(stderr) {
                return Some(ErrorKind::RateLimit);
            }
        }
        for pattern in &self.context_exceeded {
            if pattern.is_match(stdout) || pattern.is_match(stderr) {
                return Some(ErrorKind::ContextExceeded);
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
