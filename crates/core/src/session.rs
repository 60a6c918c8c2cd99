// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session root aggregate

use crate::clock::Clock;
use crate::file::FileRecord;
use crate::id::{CheckpointId, SessionId};
use crate::phase::{Phase, PhaseError};
use crate::role::{AgentRole, AgentStatus};
use crate::step::{ModelAttempt, TaskStep};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Global per-session metrics, updated on every recorded attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_attempts: u64,
    #[serde(default)]
    pub fallback_rotations: u64,
    #[serde(default)]
    pub total_latency_ms: u64,
}

impl SessionMetrics {
    pub fn record(&mut self, attempt: &ModelAttempt) {
        self.total_attempts += 1;
        self.total_tokens += attempt.tokens_used.unwrap_or(0);
        self.total_cost += attempt.estimated_cost;
        self.total_latency_ms += attempt.latency_ms;
    }

    pub fn avg_latency_ms(&self) -> u64 {
        if self.total_attempts == 0 {
            0
        } else {
            self.total_latency_ms / self.total_attempts
        }
    }
}

/// Marker for a checkpoint taken before a mutating phase. Append-only; the
/// snapshot contents live under the session directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub id: CheckpointId,
    pub label: String,
    pub created_at_ms: u64,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Last-known status of one agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusEntry {
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Root aggregate: one orchestration run over one task.
///
/// Unknown fields from newer versions are preserved across load/save via the
/// flattened `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub task: String,
    pub phase: Phase,
    /// Audit-loop iteration count; monotonic within a resumed session.
    #[serde(default)]
    pub iteration: u32,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointMeta>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
    #[serde(default)]
    pub metrics: SessionMetrics,
    /// Keyed by role name for a stable on-disk shape.
    #[serde(default)]
    pub agents: HashMap<String, AgentStatusEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    pub fn new(id: SessionId, task: impl Into<String>, clock: &impl Clock) -> Self {
        let now = clock.epoch_ms();
        Self {
            id,
            task: task.into(),
            phase: Phase::Init,
            iteration: 0,
            checkpoints: Vec::new(),
            files: Vec::new(),
            steps: Vec::new(),
            metrics: SessionMetrics::default(),
            agents: HashMap::new(),
            error: None,
            created_at_ms: now,
            last_activity_ms: now,
            extra: serde_json::Map::new(),
        }
    }

    /// Update `last_activity_ms`; called by every mutating store operation.
    pub fn touch(&mut self, clock: &impl Clock) {
        self.last_activity_ms = clock.epoch_ms();
    }

    /// Advance the phase, validating against the state machine.
    pub fn transition(&mut self, to: Phase) -> Result<(), PhaseError> {
        if !self.phase.can_transition_to(to) {
            return Err(PhaseError {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    pub fn is_resumable(&self) -> bool {
        self.phase.is_resumable()
    }

    pub fn set_agent_status(
        &mut self,
        role: AgentRole,
        status: AgentStatus,
        duration_ms: Option<u64>,
    ) {
        self.agents.insert(
            role.as_str().to_string(),
            AgentStatusEntry {
                status,
                duration_ms,
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.files.iter_mut().find(|f| f.path == path)
    }

    /// Record an attempt into a step and fold it into the session metrics.
    pub fn record_attempt(&mut self, step_index: usize, attempt: ModelAttempt) {
        self.metrics.record(&attempt);
        if let Some(step) = self.steps.get_mut(step_index) {
            step.record_attempt(attempt);
        }
    }

    /// Append a step, returning its index for later attempt recording.
    pub fn push_step(&mut self, step: TaskStep) -> usize {
        self.steps.push(step);
        self.steps.len() - 1
    }

    pub fn record_fallback_rotation(&mut self) {
        self.metrics.fallback_rotations += 1;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
