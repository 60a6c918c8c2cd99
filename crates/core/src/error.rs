// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classified error kinds shared across the adapter and engine layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failed backend invocation.
///
/// The kind, not the concrete error type, drives recovery policy: the
/// fallback chain rotates on `RateLimit`/`Unavailable`, the kernel retries
/// `ContextExceeded` with a compacted prompt, and everything else surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend reported a rate limit or quota exhaustion.
    RateLimit,
    /// Prompt rejected as larger than the backend's context window.
    ContextExceeded,
    /// The invocation hit its per-adapter timeout.
    Timeout,
    /// Nonzero exit with no usable output.
    ApiError,
    /// Adapter probe failed (binary missing, credential absent).
    Unavailable,
    /// The session's cancellation signal fired mid-call.
    Cancelled,
}

impl ErrorKind {
    /// Transient kinds are routed to the next adapter rather than surfaced.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimit | ErrorKind::Unavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ContextExceeded => "context_exceeded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ApiError => "api_error",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
