// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent roles

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four role-based agents sequenced by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Architect,
    Executor,
    Auditor,
    Consultant,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Architect,
        AgentRole::Executor,
        AgentRole::Auditor,
        AgentRole::Consultant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Architect => "architect",
            AgentRole::Executor => "executor",
            AgentRole::Auditor => "auditor",
            AgentRole::Consultant => "consultant",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse status of a role within the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
