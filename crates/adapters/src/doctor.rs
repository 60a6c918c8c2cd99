// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Doctor probes: adapter availability and environment report

use crate::backend::{BackendAdapter, CliBackend};
use orchestra_core::config::BackendEntry;

/// One row of `orchestra doctor` output.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub backend: String,
    pub provider: String,
    pub model: String,
    pub command: String,
    pub available: bool,
    /// Why the backend is unavailable, when it is.
    pub reason: Option<String>,
    /// (env var name, is set) for the credential key.
    pub credential_env: Option<(String, bool)>,
    /// (env var name, is set) for the base URL override.
    pub base_url_env: Option<(String, bool)>,
}

fn env_presence(key: &Option<String>) -> Option<(String, bool)> {
    key.as_ref().map(|k| {
        let set = std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false);
        (k.clone(), set)
    })
}

/// Probe every entry, reporting availability and env state.
pub async fn probe_backends(entries: &[BackendEntry]) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(entries.len());
    for entry in entries {
        let credential_env = env_presence(&entry.credential_env);
        let base_url_env = env_presence(&entry.base_url_env);
        let backend = CliBackend::new(entry.clone());
        let availability = backend.availability().await;
        reports.push(ProbeReport {
            backend: entry.id.clone(),
            provider: entry.provider.clone(),
            model: entry.model.clone(),
            command: entry.command.clone(),
            available: availability.is_ok(),
            reason: availability.err(),
            credential_env,
            base_url_env,
        });
    }
    reports
}

#[cfg(test)]
#[path = "doctor_tests.rs"]
mod tests;
