// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan approval protocol
//!
//! On reaching awaiting-approval the kernel emits `plan:ready` and blocks on
//! the gate. `Edit` means the caller changed the plan file on disk; the
//! kernel re-reads it and asks again.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approve,
    Reject,
    /// The plan file was edited in place; re-read and re-present.
    Edit,
}

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn decide(&self, plan: &str, plan_path: &Path) -> Approval;
}

/// Gate used by `--auto`: every plan is approved unseen.
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn decide(&self, _plan: &str, _plan_path: &Path) -> Approval {
        Approval::Approve
    }
}

/// Scripted gate for tests and non-interactive drivers; empty queue
/// approves.
#[derive(Default)]
pub struct QueueGate {
    decisions: Mutex<VecDeque<Approval>>,
}

impl QueueGate {
    pub fn with(decisions: impl IntoIterator<Item = Approval>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ApprovalGate for QueueGate {
    async fn decide(&self, _plan: &str, _plan_path: &Path) -> Approval {
        self.decisions.lock().pop_front().unwrap_or(Approval::Approve)
    }
}
