// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only step and attempt records

use crate::error::ErrorKind;
use crate::id::StepId;
use crate::role::AgentRole;
use serde::{Deserialize, Serialize};

/// One invocation of a backend by an agent on a file. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAttempt {
    pub backend: String,
    pub provider: String,
    /// Tokens consumed, when the backend reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub at_epoch_ms: u64,
    #[serde(default)]
    pub estimated_cost: f64,
}

/// Lifecycle of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Running,
    Completed,
    Failed,
}

/// One (agent role x file x iteration) unit of work. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: StepId,
    pub role: AgentRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub iteration: u32,
    #[serde(default)]
    pub attempts: Vec<ModelAttempt>,
    /// Hash of the produced artifact, for convergence detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub state: StepState,
}

impl TaskStep {
    pub fn start(
        id: StepId,
        role: AgentRole,
        file: Option<String>,
        iteration: u32,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            role,
            file,
            iteration,
            attempts: Vec::new(),
            output_hash: None,
            started_at_ms: now_ms,
            ended_at_ms: None,
            state: StepState::Running,
        }
    }

    pub fn record_attempt(&mut self, attempt: ModelAttempt) {
        self.attempts.push(attempt);
    }

    pub fn complete(&mut self, output_hash: Option<String>, now_ms: u64) {
        self.output_hash = output_hash;
        self.ended_at_ms = Some(now_ms);
        self.state = StepState::Completed;
    }

    pub fn fail(&mut self, now_ms: u64) {
        self.ended_at_ms = Some(now_ms);
        self.state = StepState::Failed;
    }

    /// Total latency across attempts.
    pub fn total_latency_ms(&self) -> u64 {
        self.attempts.iter().map(|a| a.latency_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(success: bool, latency_ms: u64) -> ModelAttempt {
        ModelAttempt {
            backend: "claude".into(),
            provider: "anthropic".into(),
            tokens_used: Some(100),
            latency_ms,
            success,
            error_kind: if success {
                None
            } else {
                Some(ErrorKind::ContextExceeded)
            },
            at_epoch_ms: 1,
            estimated_cost: 0.01,
        }
    }

    #[test]
    fn step_accumulates_attempts() {
        let mut step = TaskStep::start(
            StepId::new("s1"),
            AgentRole::Executor,
            Some("a.py".into()),
            1,
            10,
        );
        step.record_attempt(attempt(false, 100));
        step.record_attempt(attempt(true, 200));
        step.complete(Some("abc".into()), 50);

        assert_eq!(step.attempts.len(), 2);
        assert_eq!(step.total_latency_ms(), 300);
        assert_eq!(step.state, StepState::Completed);
        assert_eq!(step.attempts[0].error_kind, Some(ErrorKind::ContextExceeded));
        assert!(step.attempts[1].success);
    }

    #[test]
    fn failed_step_keeps_attempts() {
        let mut step = TaskStep::start(StepId::new("s2"), AgentRole::Architect, None, 1, 0);
        step.record_attempt(attempt(false, 10));
        step.fail(20);
        assert_eq!(step.state, StepState::Failed);
        assert_eq!(step.ended_at_ms, Some(20));
    }
}
