// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! orchestra-adapters: backend adapters and the fallback chain
//!
//! A [`backend::BackendAdapter`] wraps one generative-model CLI process
//! behind a uniform `execute` operation with classified errors. The
//! [`chain::FallbackChain`] presents an ordered list of adapters as a single
//! adapter, rotating on rate limits and unavailability while sharing one
//! process-global rate-limit set.

pub mod backend;
pub mod cancel;
pub mod chain;
pub mod doctor;
pub mod registry;

pub use backend::{
    BackendAdapter, BackendError, BackendInfo, ExecuteRequest, ExecuteSuccess,
};
pub use cancel::Cancellation;
pub use chain::{ChainAttempt, ChainError, ChainSuccess, FallbackChain, RateLimitSet};
pub use doctor::{probe_backends, ProbeReport};
pub use registry::{builtin_backends, merge_backends, resolve_chain, UnknownBackend};

#[cfg(any(test, feature = "test-support"))]
pub use backend::fake::{FakeBackend, FakeCall};
