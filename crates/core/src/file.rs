// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-file lifecycle records

use crate::id::CheckpointId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status of one planned file.
///
/// Transitions are validated by [`FileRecord::set_status`]; a record is
/// mutated only by the worker that owns it and is terminal once it reaches
/// `Complete` or `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    Pending,
    Running,
    Generated,
    AuditApproved,
    AuditRejected,
    InRecovery,
    Abandoned,
    Complete,
}

/// Invalid file status transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("file {path}: invalid status transition {from} -> {to}")]
pub struct FileStatusError {
    pub path: String,
    pub from: FileStatus,
    pub to: FileStatus,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Running => "running",
            FileStatus::Generated => "generated",
            FileStatus::AuditApproved => "audit-approved",
            FileStatus::AuditRejected => "audit-rejected",
            FileStatus::InRecovery => "in-recovery",
            FileStatus::Abandoned => "abandoned",
            FileStatus::Complete => "complete",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Complete | FileStatus::Abandoned)
    }

    pub fn can_transition_to(self, to: FileStatus) -> bool {
        use FileStatus::*;
        match (self, to) {
            (Pending, Running) => true,
            (Running, Generated) => true,
            (Running, InRecovery) | (Running, Abandoned) => true,
            (Generated, AuditApproved) | (Generated, AuditRejected) => true,
            // Pipeline mode completes a file right after its own audit.
            (Generated, Complete) => true,
            (AuditApproved, Complete) => true,
            // A rejected file is re-run by the fixing loop or handed to recovery.
            (AuditRejected, Running) | (AuditRejected, InRecovery) => true,
            (AuditRejected, Abandoned) => true,
            (InRecovery, Running) | (InRecovery, Abandoned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One record per planned path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    /// Intended contents, extracted from the plan directive.
    #[serde(default)]
    pub description: String,
    pub status: FileStatus,
    /// Duration of the most recent generation attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Checkpoint this file was last snapshotted into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointId>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            status: FileStatus::Pending,
            last_duration_ms: None,
            last_error: None,
            checkpoint: None,
        }
    }

    /// Transition to `to`, rejecting moves outside the lifecycle.
    pub fn set_status(&mut self, to: FileStatus) -> Result<(), FileStatusError> {
        if !self.status.can_transition_to(to) {
            return Err(FileStatusError {
                path: self.path.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
