// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types emitted by the orchestration kernel
//!
//! One tagged enum covers the full catalog; every event carries its full
//! payload so subscribers never need side lookups. Serializes with
//! `{"type": "scope:name", ...fields}`; unknown tags deserialize to
//! `Custom` for forward compatibility.

use crate::file::FileStatus;
use crate::id::SessionId;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of one syntax check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxOutcome {
    Passed,
    Failed,
    /// No checker available for the language on this machine.
    Skipped,
}

impl fmt::Display for SyntaxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyntaxOutcome::Passed => "passed",
            SyntaxOutcome::Failed => "failed",
            SyntaxOutcome::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Events fired by the kernel, in phase order, exactly once per transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- phases --
    #[serde(rename = "phase:start")]
    PhaseStart { phase: Phase },

    #[serde(rename = "phase:complete")]
    PhaseComplete { phase: Phase },

    #[serde(rename = "error")]
    Error { phase: Phase, message: String },

    #[serde(rename = "iteration")]
    Iteration { iteration: u32, max: u32 },

    #[serde(rename = "plan:ready")]
    PlanReady { path: PathBuf, content: String },

    // -- per-file lifecycle --
    #[serde(rename = "file:start")]
    FileStart {
        path: String,
        index: usize,
        total: usize,
    },

    #[serde(rename = "file:complete")]
    FileComplete {
        path: String,
        status: FileStatus,
        duration_ms: u64,
    },

    #[serde(rename = "file:audit")]
    FileAudit {
        path: String,
        approved: bool,
        #[serde(default)]
        issues: Vec<String>,
    },

    #[serde(rename = "syntax:check")]
    SyntaxCheck {
        path: String,
        outcome: SyntaxOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// Summary after validating a whole plan's files.
    #[serde(rename = "syntax:validation")]
    SyntaxValidation {
        checked: usize,
        passed: usize,
        failed: usize,
        skipped: usize,
    },

    #[serde(rename = "consultant")]
    Consultant { path: String, guidance: String },

    // -- adapter chain --
    #[serde(rename = "adapter:start")]
    AdapterStart {
        backend: String,
        index: usize,
        total: usize,
    },

    #[serde(rename = "adapter:fallback")]
    AdapterFallback {
        from: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        reason: String,
    },

    #[serde(rename = "adapter:success")]
    AdapterSuccess { backend: String, duration_ms: u64 },

    // -- test / commit --
    #[serde(rename = "test:start")]
    TestStart { command: String },

    #[serde(rename = "test:complete")]
    TestComplete { success: bool, duration_ms: u64 },

    #[serde(rename = "commit:start")]
    CommitStart { message: String },

    #[serde(rename = "commit:complete")]
    CommitComplete {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commit: Option<String>,
    },

    // -- watch mode --
    #[serde(rename = "watch:change")]
    WatchChange { paths: Vec<String> },

    #[serde(rename = "watch:rerun")]
    WatchRerun { session: SessionId },

    // -- session --
    #[serde(rename = "session:resume")]
    Resume { session: SessionId, phase: Phase },

    #[serde(rename = "config:loaded")]
    ConfigLoaded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },

    #[serde(rename = "parallel:progress")]
    ParallelProgress { completed: usize, total: usize },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::PhaseStart { .. } => "phase:start",
            Event::PhaseComplete { .. } => "phase:complete",
            Event::Error { .. } => "error",
            Event::Iteration { .. } => "iteration",
            Event::PlanReady { .. } => "plan:ready",
            Event::FileStart { .. } => "file:start",
            Event::FileComplete { .. } => "file:complete",
            Event::FileAudit { .. } => "file:audit",
            Event::SyntaxCheck { .. } => "syntax:check",
            Event::SyntaxValidation { .. } => "syntax:validation",
            Event::Consultant { .. } => "consultant",
            Event::AdapterStart { .. } => "adapter:start",
            Event::AdapterFallback { .. } => "adapter:fallback",
            Event::AdapterSuccess { .. } => "adapter:success",
            Event::TestStart { .. } => "test:start",
            Event::TestComplete { .. } => "test:complete",
            Event::CommitStart { .. } => "commit:start",
            Event::CommitComplete { .. } => "commit:complete",
            Event::WatchChange { .. } => "watch:change",
            Event::WatchRerun { .. } => "watch:rerun",
            Event::Resume { .. } => "session:resume",
            Event::ConfigLoaded { .. } => "config:loaded",
            Event::ParallelProgress { .. } => "parallel:progress",
            Event::Custom => "custom",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::PhaseStart { phase } | Event::PhaseComplete { phase } => {
                format!("{t} phase={phase}")
            }
            Event::Error { phase, message } => format!("{t} phase={phase} msg={message}"),
            Event::Iteration { iteration, max } => format!("{t} {iteration}/{max}"),
            Event::PlanReady { path, content } => {
                format!("{t} path={} chars={}", path.display(), content.len())
            }
            Event::FileStart { path, index, total } => {
                format!("{t} path={path} {}/{total}", index + 1)
            }
            Event::FileComplete {
                path,
                status,
                duration_ms,
            } => format!("{t} path={path} status={status} ms={duration_ms}"),
            Event::FileAudit {
                path,
                approved,
                issues,
            } => format!("{t} path={path} approved={approved} issues={}", issues.len()),
            Event::SyntaxCheck { path, outcome, .. } => {
                format!("{t} path={path} outcome={outcome}")
            }
            Event::SyntaxValidation {
                checked,
                passed,
                failed,
                skipped,
            } => format!("{t} checked={checked} passed={passed} failed={failed} skipped={skipped}"),
            Event::Consultant { path, guidance } => {
                format!("{t} path={path} chars={}", guidance.len())
            }
            Event::AdapterStart {
                backend,
                index,
                total,
            } => format!("{t} backend={backend} {}/{total}", index + 1),
            Event::AdapterFallback { from, to, reason } => match to {
                Some(to) => format!("{t} {from} -> {to} reason={reason}"),
                None => format!("{t} {from} -> (exhausted) reason={reason}"),
            },
            Event::AdapterSuccess {
                backend,
                duration_ms,
            } => format!("{t} backend={backend} ms={duration_ms}"),
            Event::TestStart { command } => format!("{t} cmd={command}"),
            Event::TestComplete {
                success,
                duration_ms,
            } => format!("{t} success={success} ms={duration_ms}"),
            Event::CommitStart { message } => format!("{t} msg={message}"),
            Event::CommitComplete { success, commit } => match commit {
                Some(sha) => format!("{t} success={success} commit={sha}"),
                None => format!("{t} success={success}"),
            },
            Event::WatchChange { paths } => format!("{t} paths={}", paths.len()),
            Event::WatchRerun { session } => format!("{t} session={session}"),
            Event::Resume { session, phase } => format!("{t} session={session} phase={phase}"),
            Event::ConfigLoaded { path } => match path {
                Some(p) => format!("{t} path={}", p.display()),
                None => format!("{t} defaults"),
            },
            Event::ParallelProgress { completed, total } => format!("{t} {completed}/{total}"),
            Event::Custom => t.to_string(),
        }
    }
}

/// Uniform callback surface for kernel events.
///
/// Implementations must not block: the kernel emits from hot paths and from
/// worker contexts. The engine's bus writes to the durable session log first
/// and fans out with bounded, drop-on-full channels.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn emit(&self, event: Event) {
        (**self).emit(event);
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
