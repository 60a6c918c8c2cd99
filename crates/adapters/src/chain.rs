// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fallback chain
//!
//! Presents an ordered adapter list as a single adapter. The cursor sticks
//! at the last successful adapter (warm preference); rate-limited and
//! unavailable entries are skipped; every other failure surfaces
//! immediately. The rate-limit set is shared by all chains of a kernel and
//! only an explicit [`FallbackChain::reset_rate_limits`] clears it.

use crate::backend::{BackendAdapter, BackendError, ExecuteRequest, ExecuteSuccess};
use orchestra_core::{ErrorKind, Event, EventSink};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Process-global set of backends currently marked rate-limited.
///
/// Shared among all concurrent workers; writes take the lock, reads are
/// cheap and a stale read only costs one extra attempt.
#[derive(Clone, Default)]
pub struct RateLimitSet {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl RateLimitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, backend: &str) {
        self.inner.write().insert(backend.to_string());
    }

    pub fn contains(&self, backend: &str) -> bool {
        self.inner.read().contains(backend)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn snapshot(&self) -> Vec<String> {
        let mut backends: Vec<String> = self.inner.read().iter().cloned().collect();
        backends.sort();
        backends
    }
}

/// One attempt made while walking the chain; folded into step records.
#[derive(Debug, Clone)]
pub struct ChainAttempt {
    pub backend: String,
    pub provider: String,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub duration: Duration,
}

/// Successful chain call.
#[derive(Debug, Clone)]
pub struct ChainSuccess {
    pub backend: String,
    pub provider: String,
    pub result: ExecuteSuccess,
    pub attempts: Vec<ChainAttempt>,
}

/// Failed chain call.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A substantive error from one adapter; fallback is reserved for rate
    /// limits and unavailability.
    #[error("{error}")]
    Backend {
        error: BackendError,
        attempts: Vec<ChainAttempt>,
    },
    /// Every adapter was rate-limited, unavailable, or skipped.
    #[error("all backends exhausted{}", last_message(.last))]
    Exhausted {
        last: Option<BackendError>,
        attempts: Vec<ChainAttempt>,
    },
}

fn last_message(last: &Option<BackendError>) -> String {
    match last {
        Some(err) => format!(" (last: {err})"),
        None => String::new(),
    }
}

impl ChainError {
    pub fn attempts(&self) -> &[ChainAttempt] {
        match self {
            ChainError::Backend { attempts, .. } | ChainError::Exhausted { attempts, .. } => {
                attempts
            }
        }
    }

    /// The classified kind the kernel should react to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Backend { error, .. } => error.kind,
            ChainError::Exhausted { last, .. } => {
                last.as_ref().map(|e| e.kind).unwrap_or(ErrorKind::Unavailable)
            }
        }
    }
}

/// Ordered adapter list behind a single `execute`.
pub struct FallbackChain {
    label: String,
    adapters: Vec<Arc<dyn BackendAdapter>>,
    cursor: Mutex<usize>,
    rate_limits: RateLimitSet,
    sink: Arc<dyn EventSink>,
}

impl FallbackChain {
    pub fn new(
        label: impl Into<String>,
        adapters: Vec<Arc<dyn BackendAdapter>>,
        rate_limits: RateLimitSet,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            label: label.into(),
            adapters,
            cursor: Mutex::new(0),
            rate_limits,
            sink,
        }
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn rate_limits(&self) -> &RateLimitSet {
        &self.rate_limits
    }

    /// Clear the shared rate-limit set and rewind the cursor. Never called
    /// automatically; policy belongs to the caller.
    pub fn reset_rate_limits(&self) {
        self.rate_limits.clear();
        *self.cursor.lock() = 0;
    }

    fn backend_name(&self, index: usize) -> Option<String> {
        self.adapters.get(index).map(|a| a.info().name)
    }

    /// Try adapters from the cursor to the end of the list.
    pub async fn execute(
        &self,
        request: ExecuteRequest<'_>,
    ) -> Result<ChainSuccess, ChainError> {
        let start_index = *self.cursor.lock();
        let total = self.adapters.len();
        let mut attempts: Vec<ChainAttempt> = Vec::new();
        let mut last_error: Option<BackendError> = None;

        for index in start_index..total {
            let adapter = &self.adapters[index];
            let info = adapter.info();

            if self.rate_limits.contains(&info.name) {
                tracing::debug!(chain = %self.label, backend = %info.name, "skipping rate-limited backend");
                continue;
            }

            if let Err(reason) = adapter.availability().await {
                tracing::debug!(chain = %self.label, backend = %info.name, %reason, "backend unavailable");
                attempts.push(ChainAttempt {
                    backend: info.name.clone(),
                    provider: info.provider.clone(),
                    success: false,
                    error_kind: Some(ErrorKind::Unavailable),
                    duration: Duration::ZERO,
                });
                self.sink.emit(Event::AdapterFallback {
                    from: info.name.clone(),
                    to: self.backend_name(index + 1),
                    reason,
                });
                continue;
            }

            self.sink.emit(Event::AdapterStart {
                backend: info.name.clone(),
                index,
                total,
            });

            match adapter.execute(request).await {
                Ok(result) => {
                    *self.cursor.lock() = index;
                    self.sink.emit(Event::AdapterSuccess {
                        backend: info.name.clone(),
                        duration_ms: result.duration.as_millis() as u64,
                    });
                    attempts.push(ChainAttempt {
                        backend: info.name.clone(),
                        provider: info.provider.clone(),
                        success: true,
                        error_kind: None,
                        duration: result.duration,
                    });
                    return Ok(ChainSuccess {
                        backend: info.name,
                        provider: info.provider,
                        result,
                        attempts,
                    });
                }
                Err(error) => {
                    attempts.push(ChainAttempt {
                        backend: info.name.clone(),
                        provider: info.provider.clone(),
                        success: false,
                        error_kind: Some(error.kind),
                        duration: error.duration,
                    });
                    if error.kind == ErrorKind::RateLimit {
                        self.rate_limits.mark(&info.name);
                        self.sink.emit(Event::AdapterFallback {
                            from: info.name.clone(),
                            to: self.backend_name(index + 1),
                            reason: "rate limit".to_string(),
                        });
                        tracing::warn!(chain = %self.label, backend = %info.name, "rate limited, rotating");
                        last_error = Some(error);
                        continue;
                    }
                    return Err(ChainError::Backend { error, attempts });
                }
            }
        }

        Err(ChainError::Exhausted {
            last: last_error,
            attempts,
        })
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
