// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend adapter abstraction
//!
//! An adapter translates `(prompt, optional output path, working dir)` into
//! a classified result. Each backend is an opaque process: given a prompt it
//! produces text or fails with an [`ErrorKind`].

pub mod cli;
pub mod patterns;
pub mod process;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use cli::CliBackend;

use crate::cancel::Cancellation;
use async_trait::async_trait;
use orchestra_core::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Static adapter metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub name: String,
    pub provider: String,
    pub model: String,
}

/// One invocation request.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteRequest<'a> {
    pub prompt: &'a str,
    /// When set, successful output is also written to this path.
    pub output_path: Option<&'a Path>,
    pub working_dir: Option<&'a Path>,
    pub cancel: &'a Cancellation,
}

/// A successful invocation.
#[derive(Debug, Clone)]
pub struct ExecuteSuccess {
    pub output: String,
    pub duration: Duration,
    pub output_path: Option<PathBuf>,
}

/// A failed invocation, classified by kind.
#[derive(Debug, Clone, Error)]
#[error("{backend}: {kind}: {message}")]
pub struct BackendError {
    pub backend: String,
    pub kind: ErrorKind,
    pub message: String,
    pub duration: Duration,
}

impl BackendError {
    pub fn new(
        backend: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            backend: backend.into(),
            kind,
            message: message.into(),
            duration,
        }
    }
}

/// Adapter around one generative-model backend.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Launch the backend with the prompt, classify the outcome, and write
    /// successful output to `request.output_path` when given.
    async fn execute(&self, request: ExecuteRequest<'_>) -> Result<ExecuteSuccess, BackendError>;

    /// Cheap probe: binary on PATH or credential present, depending on the
    /// adapter kind. `Err` carries the reason for the skip.
    async fn availability(&self) -> Result<(), String>;

    fn info(&self) -> BackendInfo;

    async fn is_available(&self) -> bool {
        self.availability().await.is_ok()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
