// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builtin backend registry
//!
//! One row per known generative-model CLI. The config file may override a
//! row by id or append new ones; `agents.<role>` arrays then select and
//! order entries into per-role fallback chains.

use orchestra_core::config::{BackendEntry, PromptDelivery};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown backend '{id}' (known: {known})")]
pub struct UnknownBackend {
    pub id: String,
    pub known: String,
}

fn entry(
    id: &str,
    provider: &str,
    model: &str,
    command: &str,
    args: &[&str],
    credential_env: &str,
    base_url_env: &str,
    context_window: u64,
    cost_per_1k_tokens: f64,
) -> BackendEntry {
    BackendEntry {
        id: id.to_string(),
        provider: provider.to_string(),
        model: model.to_string(),
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        prompt: PromptDelivery::Arg,
        env: HashMap::new(),
        credential_env: Some(credential_env.to_string()),
        requires_credential: false,
        base_url_env: Some(base_url_env.to_string()),
        timeout_ms: 300_000,
        context_window,
        cost_per_1k_tokens,
    }
}

/// The builtin rows.
pub fn builtin_backends() -> Vec<BackendEntry> {
    vec![
        entry(
            "claude",
            "anthropic",
            "claude-sonnet-4",
            "claude",
            &["--print", "{prompt}"],
            "ANTHROPIC_API_KEY",
            "ANTHROPIC_BASE_URL",
            200_000,
            0.003,
        ),
        entry(
            "codex",
            "openai",
            "gpt-5",
            "codex",
            &["exec", "{prompt}"],
            "OPENAI_API_KEY",
            "OPENAI_BASE_URL",
            128_000,
            0.00125,
        ),
        entry(
            "gemini",
            "google",
            "gemini-2.5-pro",
            "gemini",
            &["-p", "{prompt}"],
            "GEMINI_API_KEY",
            "GOOGLE_GEMINI_BASE_URL",
            1_000_000,
            0.00125,
        ),
        entry(
            "qwen",
            "alibaba",
            "qwen3-coder",
            "qwen",
            &["-p", "{prompt}"],
            "DASHSCOPE_API_KEY",
            "DASHSCOPE_BASE_URL",
            256_000,
            0.0008,
        ),
    ]
}

/// Overlay config-provided entries on the builtin rows, by id.
pub fn merge_backends(overrides: &[BackendEntry]) -> Vec<BackendEntry> {
    let mut merged = builtin_backends();
    for over in overrides {
        match merged.iter_mut().find(|e| e.id == over.id) {
            Some(slot) => *slot = over.clone(),
            None => merged.push(over.clone()),
        }
    }
    merged
}

/// Resolve an ordered id list into entries.
pub fn resolve_chain(
    ids: &[String],
    entries: &[BackendEntry],
) -> Result<Vec<BackendEntry>, UnknownBackend> {
    ids.iter()
        .map(|id| {
            entries
                .iter()
                .find(|e| &e.id == id)
                .cloned()
                .ok_or_else(|| UnknownBackend {
                    id: id.clone(),
                    known: entries
                        .iter()
                        .map(|e| e.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
        })
        .collect()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
