// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session persistence
//!
//! On-disk layout per session:
//!
//! ```text
//! .orchestra/<session-id>/
//!   session.json       root aggregate (atomic temp+rename)
//!   plan.md            current plan
//!   events.log         JSONL event stream
//!   metrics.json       metrics snapshot
//!   audit-result.json  last audit outcome
//!   output/<role>.md   last raw output per agent role
//!   checkpoints/<id>/  snapshots (see checkpoint module)
//! ```

use orchestra_core::{
    AgentRole, AgentStatus, Clock, Event, IdGen, Phase, PhaseError, Session, SessionId,
};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory name under the project root.
pub const STORE_DIR_NAME: &str = ".orchestra";

const SESSION_FILE: &str = "session.json";
const PLAN_FILE: &str = "plan.md";
const EVENTS_FILE: &str = "events.log";
const METRICS_FILE: &str = "metrics.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
}

/// Compact listing row for `history` and `status`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub task: String,
    pub phase: Phase,
    pub iteration: u32,
    pub files_total: usize,
    pub files_complete: usize,
    pub total_cost: f64,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
}

impl SessionSummary {
    fn from_session(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            task: session.task.clone(),
            phase: session.phase,
            iteration: session.iteration,
            files_total: session.files.len(),
            files_complete: session
                .files
                .iter()
                .filter(|f| f.status == orchestra_core::FileStatus::Complete)
                .count(),
            total_cost: session.metrics.total_cost,
            created_at_ms: session.created_at_ms,
            last_activity_ms: session.last_activity_ms,
        }
    }

    pub fn last_activity(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.last_activity_ms as i64)
            .unwrap_or_default()
    }
}

/// Query over past sessions.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub limit: Option<usize>,
    pub status: Option<Phase>,
    /// Case-insensitive needle searched in the task, the session id, and
    /// the plan text.
    pub search: Option<String>,
}

/// Durable store rooted at `<project>/.orchestra`.
pub struct SessionStore<C: Clock> {
    root: PathBuf,
    clock: C,
}

impl<C: Clock> SessionStore<C> {
    pub fn new(project_root: &Path, clock: C) -> Self {
        Self {
            root: project_root.join(STORE_DIR_NAME),
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Create and persist a fresh session.
    pub fn create(&self, task: &str, ids: &impl IdGen) -> Result<Session, StoreError> {
        let id = SessionId::new(ids.next());
        let mut session = Session::new(id, task, &self.clock);
        std::fs::create_dir_all(self.session_dir(&session.id))?;
        self.save(&mut session)?;
        Ok(session)
    }

    /// Persist the session atomically, refreshing `last_activity`.
    pub fn save(&self, session: &mut Session) -> Result<(), StoreError> {
        session.touch(&self.clock);
        let dir = self.session_dir(&session.id);
        std::fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(SESSION_FILE), &serde_json::to_vec_pretty(session)?)?;
        write_atomic(
            &dir.join(METRICS_FILE),
            &serde_json::to_vec_pretty(&session.metrics)?,
        )?;
        Ok(())
    }

    /// Load a session; `Ok(None)` when the directory or file is absent.
    pub fn load(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let path = self.root.join(id).join(SESSION_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Validated phase transition, persisted.
    pub fn set_phase(&self, session: &mut Session, phase: Phase) -> Result<(), StoreError> {
        session.transition(phase)?;
        self.save(session)
    }

    /// Force a phase without validation; used for crash-style abort writes
    /// (`failed` with a reason) where the machine is being torn down.
    pub fn force_phase(
        &self,
        session: &mut Session,
        phase: Phase,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        session.phase = phase;
        if let Some(reason) = reason {
            session.error = Some(reason);
        }
        self.save(session)
    }

    pub fn set_iteration(&self, session: &mut Session, iteration: u32) -> Result<(), StoreError> {
        session.iteration = iteration;
        self.save(session)
    }

    pub fn set_agent_status(
        &self,
        session: &mut Session,
        role: AgentRole,
        status: AgentStatus,
        duration_ms: Option<u64>,
    ) -> Result<(), StoreError> {
        session.set_agent_status(role, status, duration_ms);
        self.save(session)
    }

    pub fn set_error(&self, session: &mut Session, message: &str) -> Result<(), StoreError> {
        session.error = Some(message.to_string());
        self.save(session)
    }

    /// A session can resume iff it loads and its phase is not terminal.
    pub fn can_resume(&self, id: &str) -> bool {
        matches!(self.load(id), Ok(Some(session)) if session.is_resumable())
    }

    pub fn save_plan(&self, id: &SessionId, content: &str) -> Result<PathBuf, StoreError> {
        let path = self.session_dir(id).join(PLAN_FILE);
        std::fs::create_dir_all(self.session_dir(id))?;
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    pub fn load_plan(&self, id: &SessionId) -> Result<Option<String>, StoreError> {
        let path = self.session_dir(id).join(PLAN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    pub fn plan_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(PLAN_FILE)
    }

    /// Last raw output of one agent role, kept for debugging and resume.
    pub fn save_agent_output(
        &self,
        id: &SessionId,
        role: AgentRole,
        content: &str,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.session_dir(id).join("output");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{role}.md"));
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Persist an arbitrary JSON artifact (e.g. `audit-result.json`).
    pub fn write_json(
        &self,
        id: &SessionId,
        file_name: &str,
        value: &impl Serialize,
    ) -> Result<(), StoreError> {
        let dir = self.session_dir(id);
        std::fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(file_name), &serde_json::to_vec_pretty(value)?)?;
        Ok(())
    }

    /// Append one event to the durable session log. Never buffered: the
    /// event bus calls this before any fan-out.
    pub fn append_event(&self, id: &SessionId, event: &Event) -> Result<(), StoreError> {
        let dir = self.session_dir(id);
        std::fs::create_dir_all(&dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(EVENTS_FILE))?;
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }

    /// Remove one session directory entirely.
    pub fn clear(&self, id: &str) -> Result<(), StoreError> {
        let dir = self.root.join(id);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// List sessions, newest activity first.
    pub fn list(&self, filter: &HistoryFilter) -> Result<Vec<SessionSummary>, StoreError> {
        let mut summaries = Vec::new();
        if !self.root.exists() {
            return Ok(summaries);
        }
        for dir in std::fs::read_dir(&self.root)? {
            let dir = dir?;
            if !dir.file_type()?.is_dir() {
                continue;
            }
            let id = dir.file_name().to_string_lossy().into_owned();
            let Ok(Some(session)) = self.load(&id) else {
                // Unreadable session dirs are listed nowhere but never fail
                // the query.
                tracing::debug!(id, "skipping unreadable session dir");
                continue;
            };
            if let Some(status) = filter.status {
                if session.phase != status {
                    continue;
                }
            }
            if let Some(needle) = &filter.search {
                if !self.matches_search(&session, needle)? {
                    continue;
                }
            }
            summaries.push(SessionSummary::from_session(&session));
        }
        summaries.sort_by(|a, b| b.last_activity_ms.cmp(&a.last_activity_ms));
        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }
        Ok(summaries)
    }

    fn matches_search(&self, session: &Session, needle: &str) -> Result<bool, StoreError> {
        let needle = needle.to_lowercase();
        if session.task.to_lowercase().contains(&needle)
            || session.id.as_str().to_lowercase().contains(&needle)
        {
            return Ok(true);
        }
        if let Some(plan) = self.load_plan(&session.id)? {
            if plan.to_lowercase().contains(&needle) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The session with the most recent activity, if any.
    pub fn latest(&self) -> Result<Option<SessionSummary>, StoreError> {
        Ok(self.list(&HistoryFilter::default())?.into_iter().next())
    }

    /// The most recent session whose phase is not terminal.
    pub fn latest_resumable(&self) -> Result<Option<Session>, StoreError> {
        for summary in self.list(&HistoryFilter::default())? {
            if summary.phase.is_resumable() {
                return self.load(summary.id.as_str());
            }
        }
        Ok(None)
    }
}

/// Write-to-temp-then-rename with an fsync in between.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
