// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake backend adapter for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BackendAdapter, BackendError, BackendInfo, ExecuteRequest, ExecuteSuccess};
use async_trait::async_trait;
use orchestra_core::ErrorKind;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Recorded call to a [`FakeBackend`].
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub prompt: String,
    pub output_path: Option<PathBuf>,
}

/// Scripted outcome for one `execute` call.
#[derive(Debug, Clone)]
enum Scripted {
    Ok(String),
    Err(ErrorKind),
}

struct FakeState {
    script: VecDeque<Scripted>,
    calls: Vec<FakeCall>,
    availability: Result<(), String>,
    default_response: String,
    latency: Duration,
}

/// Fake backend with a scripted outcome queue and recorded calls.
///
/// Once the script runs dry, every call succeeds with the default response.
#[derive(Clone)]
pub struct FakeBackend {
    name: String,
    provider: String,
    inner: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: "fake".to_string(),
            inner: Arc::new(Mutex::new(FakeState {
                script: VecDeque::new(),
                calls: Vec::new(),
                availability: Ok(()),
                default_response: "ok".to_string(),
                latency: Duration::from_millis(1),
            })),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.inner.lock().default_response = response.into();
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.lock().latency = latency;
        self
    }

    /// Queue a successful response for the next call.
    pub fn push_ok(&self, response: impl Into<String>) {
        self.inner.lock().script.push_back(Scripted::Ok(response.into()));
    }

    /// Queue a classified failure for the next call.
    pub fn push_err(&self, kind: ErrorKind) {
        self.inner.lock().script.push_back(Scripted::Err(kind));
    }

    pub fn set_unavailable(&self, reason: impl Into<String>) {
        self.inner.lock().availability = Err(reason.into());
    }

    pub fn set_available(&self) {
        self.inner.lock().availability = Ok(());
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.inner.lock().calls.last().map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl BackendAdapter for FakeBackend {
    async fn execute(&self, request: ExecuteRequest<'_>) -> Result<ExecuteSuccess, BackendError> {
        let (outcome, latency) = {
            let mut state = self.inner.lock();
            state.calls.push(FakeCall {
                prompt: request.prompt.to_string(),
                output_path: request.output_path.map(PathBuf::from),
            });
            let outcome = state
                .script
                .pop_front()
                .unwrap_or_else(|| Scripted::Ok(state.default_response.clone()));
            (outcome, state.latency)
        };

        if request.cancel.is_cancelled() {
            return Err(BackendError::new(
                self.name.clone(),
                ErrorKind::Cancelled,
                "cancelled",
                latency,
            ));
        }

        match outcome {
            Scripted::Ok(output) => {
                if let Some(path) = request.output_path {
                    if let Some(parent) = path.parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    tokio::fs::write(path, &output).await.map_err(|e| {
                        BackendError::new(self.name.clone(), ErrorKind::ApiError, e.to_string(), latency)
                    })?;
                }
                Ok(ExecuteSuccess {
                    output,
                    duration: latency,
                    output_path: request.output_path.map(PathBuf::from),
                })
            }
            Scripted::Err(kind) => Err(BackendError::new(
                self.name.clone(),
                kind,
                format!("scripted {kind}"),
                latency,
            )),
        }
    }

    async fn availability(&self) -> Result<(), String> {
        self.inner.lock().availability.clone()
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            provider: self.provider.clone(),
            model: format!("{}-model", self.name),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
