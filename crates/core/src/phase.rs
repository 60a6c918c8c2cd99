// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session phase state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phases of the orchestration state machine.
///
/// Transitions are validated by [`Phase::can_transition_to`]; the kernel is
/// the only writer and advances phases sequentially within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Init,
    Planning,
    AwaitingApproval,
    Executing,
    Fixing,
    Consulting,
    Auditing,
    Recovery,
    Testing,
    Committing,
    Completed,
    Failed,
    Rejected,
    MaxIterations,
}

/// Invalid phase transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid phase transition: {from} -> {to}")]
pub struct PhaseError {
    pub from: Phase,
    pub to: Phase,
}

impl Phase {
    pub const ALL: [Phase; 14] = [
        Phase::Init,
        Phase::Planning,
        Phase::AwaitingApproval,
        Phase::Executing,
        Phase::Fixing,
        Phase::Consulting,
        Phase::Auditing,
        Phase::Recovery,
        Phase::Testing,
        Phase::Committing,
        Phase::Completed,
        Phase::Failed,
        Phase::Rejected,
        Phase::MaxIterations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Planning => "planning",
            Phase::AwaitingApproval => "awaiting-approval",
            Phase::Executing => "executing",
            Phase::Fixing => "fixing",
            Phase::Consulting => "consulting",
            Phase::Auditing => "auditing",
            Phase::Recovery => "recovery",
            Phase::Testing => "testing",
            Phase::Committing => "committing",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::Rejected => "rejected",
            Phase::MaxIterations => "max-iterations",
        }
    }

    /// Terminal phases accept no further transitions except the watch-mode
    /// re-entry from `Completed` back into `Planning`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Rejected)
    }

    /// A session is resumable iff its phase is not terminal.
    pub fn is_resumable(self) -> bool {
        !self.is_terminal()
    }

    /// Whether a transition from `self` to `to` is part of the state machine.
    pub fn can_transition_to(self, to: Phase) -> bool {
        use Phase::*;
        // Any non-terminal phase may abort to Failed.
        if to == Failed {
            return !self.is_terminal();
        }
        match (self, to) {
            (Init, Planning) => true,
            (Planning, AwaitingApproval) => true,
            (AwaitingApproval, Executing) | (AwaitingApproval, Rejected) => true,
            // Pipeline mode audits per file inside the executing phase, so
            // executing may complete the session directly.
            (Executing, Auditing) | (Executing, Recovery) => true,
            (Executing, Testing) | (Executing, Committing) | (Executing, Completed) => true,
            (Auditing, Completed) | (Auditing, Fixing) => true,
            (Auditing, MaxIterations) | (Auditing, Recovery) => true,
            (Auditing, Testing) | (Auditing, Committing) => true,
            (Fixing, Auditing) | (Fixing, Recovery) => true,
            (Recovery, Consulting) | (Recovery, Testing) => true,
            (Recovery, Committing) | (Recovery, Completed) => true,
            (Consulting, Recovery) => true,
            (MaxIterations, Recovery) | (MaxIterations, Completed) => true,
            (Testing, Committing) | (Testing, Completed) => true,
            (Committing, Completed) => true,
            // Watch mode re-enters planning after a debounced change.
            (Completed, Planning) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown phase name in user input.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase: {0}")]
pub struct ParsePhaseError(pub String);

impl std::str::FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
