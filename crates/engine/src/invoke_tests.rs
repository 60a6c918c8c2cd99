// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchestra_adapters::backend::BackendAdapter;
use orchestra_adapters::{FakeBackend, RateLimitSet};
use orchestra_core::{FakeClock, NullSink};
use std::sync::Arc;

fn chain_of(backends: Vec<FakeBackend>) -> FallbackChain {
    let adapters = backends
        .into_iter()
        .map(|b| Arc::new(b) as Arc<dyn BackendAdapter>)
        .collect();
    FallbackChain::new(
        "test",
        adapters,
        RateLimitSet::new(),
        Arc::new(NullSink),
    )
}

fn invoker() -> Invoker<FakeClock> {
    let mut costs = HashMap::new();
    costs.insert("a".to_string(), 1.0);
    Invoker::new(FakeClock::at(7_000), costs)
}

#[tokio::test]
async fn success_records_one_attempt() {
    let backend = FakeBackend::new("a").with_response("answer");
    let chain = chain_of(vec![backend]);
    let cancel = Cancellation::new();

    let outcome = invoker()
        .invoke(&chain, "four char prompt", None, None, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.text, "answer");
    assert_eq!(outcome.backend, "a");
    assert_eq!(outcome.compactions, 0);
    assert_eq!(outcome.attempts.len(), 1);
    let attempt = &outcome.attempts[0];
    assert!(attempt.success);
    assert_eq!(attempt.at_epoch_ms, 7_000);
    assert!(attempt.tokens_used.unwrap() > 0);
    assert!(attempt.estimated_cost > 0.0);
}

#[tokio::test]
async fn context_exceeded_compacts_and_retries() {
    let backend = FakeBackend::new("a");
    backend.push_err(orchestra_core::ErrorKind::ContextExceeded);
    backend.push_ok("made it");
    let probe = backend.clone();
    let chain = chain_of(vec![backend]);
    let cancel = Cancellation::new();

    // Duplicate sentences give the compactor something to remove.
    let prompt = "Implement the widget module now. ".repeat(40);
    let outcome = invoker()
        .invoke(&chain, &prompt, None, None, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.text, "made it");
    assert_eq!(outcome.compactions, 1);
    // Step records two attempts: the context failure, then the success.
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(
        outcome.attempts[0].error_kind,
        Some(orchestra_core::ErrorKind::ContextExceeded)
    );
    assert!(outcome.attempts[1].success);
    // The retried prompt is genuinely smaller.
    let prompts: Vec<String> = probe.calls().into_iter().map(|c| c.prompt).collect();
    assert!(prompts[1].len() < prompts[0].len() / 2);
}

#[tokio::test]
async fn context_exceeded_on_every_retry_surfaces_after_two() {
    let backend = FakeBackend::new("a");
    for _ in 0..3 {
        backend.push_err(orchestra_core::ErrorKind::ContextExceeded);
    }
    let probe = backend.clone();
    let chain = chain_of(vec![backend]);
    let cancel = Cancellation::new();

    let (error, attempts) = invoker()
        .invoke(&chain, "some prompt text here", None, None, &cancel)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), orchestra_core::ErrorKind::ContextExceeded);
    // Initial call plus exactly two compaction retries.
    assert_eq!(probe.call_count(), 3);
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| !a.success));
}

#[tokio::test]
async fn substantive_error_does_not_compact() {
    let backend = FakeBackend::new("a");
    backend.push_err(orchestra_core::ErrorKind::ApiError);
    let probe = backend.clone();
    let chain = chain_of(vec![backend]);
    let cancel = Cancellation::new();

    let (error, attempts) = invoker()
        .invoke(&chain, "prompt", None, None, &cancel)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), orchestra_core::ErrorKind::ApiError);
    assert_eq!(probe.call_count(), 1);
    assert_eq!(attempts.len(), 1);
}

#[tokio::test]
async fn cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = orchestra_storage::PromptCache::new(dir.path());
    let backend = FakeBackend::new("a").with_response("fresh");
    let probe = backend.clone();
    let chain = chain_of(vec![backend]);
    let cancel = Cancellation::new();
    let invoker = invoker().with_cache(cache, true);

    let first = invoker
        .invoke(&chain, "same prompt", None, None, &cancel)
        .await
        .unwrap();
    assert!(!first.from_cache);
    let second = invoker
        .invoke(&chain, "same prompt", None, None, &cancel)
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.text, "fresh");
    assert_eq!(probe.call_count(), 1);
}
