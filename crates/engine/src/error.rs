// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine errors

use orchestra_core::{ConfigError, PhaseError};
use orchestra_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the kernel. Everything recoverable is absorbed by the
/// audit or recovery loops before it reaches this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unusable configuration; the CLI maps this to exit code 2 and never
    /// touches session state.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration error: {0}")]
    UnknownBackend(#[from] orchestra_adapters::UnknownBackend),
    #[error("no configured backend is available{}", reasons_suffix(.reasons))]
    NoBackendAvailable { reasons: Vec<String> },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("planning failed: {0}")]
    Planning(String),
    #[error("session cancelled")]
    Cancelled,
    #[error("no resumable session found")]
    NothingToResume,
    #[error("{0}")]
    Other(String),
}

fn reasons_suffix(reasons: &[String]) -> String {
    if reasons.is_empty() {
        String::new()
    } else {
        format!(" ({})", reasons.join("; "))
    }
}

impl EngineError {
    /// True for errors that must become exit code 2 (unusable config).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EngineError::Config(_)
                | EngineError::UnknownBackend(_)
                | EngineError::NoBackendAvailable { .. }
        )
    }
}
