// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tag_matches_name() {
    let event = Event::PhaseStart {
        phase: Phase::Planning,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "phase:start");
    assert_eq!(json["phase"], "planning");
}

#[test]
fn round_trips_with_payload() {
    let event = Event::AdapterFallback {
        from: "claude".into(),
        to: Some("codex".into()),
        reason: "rate limit".into(),
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn unknown_tag_becomes_custom() {
    let back: Event = serde_json::from_str(r#"{"type":"future:thing","x":1}"#).unwrap();
    assert_eq!(back, Event::Custom);
}

#[test]
fn optional_fields_are_omitted() {
    let event = Event::CommitComplete {
        success: true,
        commit: None,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("commit").is_none());
}

#[yare::parameterized(
    file_start = {
        Event::FileStart { path: "a.py".into(), index: 0, total: 3 },
        "file:start path=a.py 1/3"
    },
    progress = {
        Event::ParallelProgress { completed: 2, total: 5 },
        "parallel:progress 2/5"
    },
    fallback_exhausted = {
        Event::AdapterFallback { from: "qwen".into(), to: None, reason: "rate limit".into() },
        "adapter:fallback qwen -> (exhausted) reason=rate limit"
    },
    syntax = {
        Event::SyntaxCheck { path: "x.go".into(), outcome: SyntaxOutcome::Skipped, detail: None },
        "syntax:check path=x.go outcome=skipped"
    },
)]
fn log_summaries(event: Event, expected: &str) {
    assert_eq!(event.log_summary(), expected);
}

#[test]
fn null_sink_accepts_anything() {
    NullSink.emit(Event::Custom);
    let arc: std::sync::Arc<dyn EventSink> = std::sync::Arc::new(NullSink);
    arc.emit(Event::Iteration { iteration: 1, max: 3 });
}
