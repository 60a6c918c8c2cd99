// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared output helpers

use orchestra_engine::SessionOutcome;
use orchestra_storage::SessionSummary;

/// One-line run summary, printed on success.
pub fn outcome_line(outcome: &SessionOutcome) -> String {
    format!(
        "session {} {}: {} file(s) complete, {} abandoned, iteration {}, cost ${:.4}",
        outcome.session_id.short(8),
        outcome.phase,
        outcome.files_complete,
        outcome.files_abandoned,
        outcome.iteration,
        outcome.total_cost,
    )
}

/// One listing row for `history` and `status`.
pub fn summary_line(summary: &SessionSummary) -> String {
    format!(
        "{}  {:18} {:>2}  {:>3}/{:<3} {}  {}",
        summary.id.short(8),
        summary.phase.to_string(),
        summary.iteration,
        summary.files_complete,
        summary.files_total,
        summary.last_activity().format("%Y-%m-%d %H:%M:%S"),
        summary.task,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{Phase, SessionId};

    #[test]
    fn outcome_line_is_single_line() {
        let outcome = SessionOutcome {
            session_id: SessionId::new("0123456789abcdef"),
            phase: Phase::Completed,
            iteration: 2,
            files_complete: 3,
            files_abandoned: 1,
            total_cost: 0.1234,
            error: None,
        };
        let line = outcome_line(&outcome);
        assert!(line.starts_with("session 01234567 completed"));
        assert!(!line.contains('\n'));
        assert!(line.contains("$0.1234"));
    }

    #[test]
    fn summary_line_contains_task_and_phase() {
        let summary = SessionSummary {
            id: SessionId::new("deadbeef99"),
            task: "build the widget".into(),
            phase: Phase::Executing,
            iteration: 1,
            files_total: 4,
            files_complete: 2,
            total_cost: 0.0,
            created_at_ms: 0,
            last_activity_ms: 1_700_000_000_000,
        };
        let line = summary_line(&summary);
        assert!(line.contains("deadbeef"));
        assert!(line.contains("executing"));
        assert!(line.contains("build the widget"));
    }
}
