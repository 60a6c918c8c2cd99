// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::invoke::Invoker;
use crate::syntax::SyntaxValidator;
use orchestra_adapters::backend::BackendAdapter;
use orchestra_adapters::{FakeBackend, RateLimitSet};
use orchestra_core::config::Language;
use orchestra_core::{ErrorKind, FakeClock, NullSink};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn chain_of(backend: FakeBackend) -> FallbackChain {
    FallbackChain::new(
        "test",
        vec![Arc::new(backend) as Arc<dyn BackendAdapter>],
        RateLimitSet::new(),
        Arc::new(NullSink),
    )
}

struct Fixture {
    dir: TempDir,
    invoker: Invoker<FakeClock>,
    consultant: FallbackChain,
    executor: FallbackChain,
    validator: SyntaxValidator,
    cancel: Cancellation,
}

fn fixture(consultant: FakeBackend, executor: FakeBackend) -> Fixture {
    Fixture {
        dir: TempDir::new().unwrap(),
        invoker: Invoker::new(FakeClock::at(1), HashMap::new()),
        consultant: chain_of(consultant),
        executor: chain_of(executor),
        validator: SyntaxValidator::new(&Language::ALL),
        cancel: Cancellation::new(),
    }
}

fn context<'a>(fx: &'a Fixture, overrides: &'a PromptOverrides, max_attempts: u32) -> RecoveryContext<'a, FakeClock> {
    RecoveryContext {
        invoker: &fx.invoker,
        consultant_chain: &fx.consultant,
        executor_chain: &fx.executor,
        validator: &fx.validator,
        sink: &NullSink,
        overrides,
        project_root: fx.dir.path(),
        task: "build it",
        max_attempts,
        cancel: &fx.cancel,
    }
}

#[tokio::test]
async fn recovers_on_first_attempt_with_guidance() {
    let consultant = FakeBackend::new("consultant").with_response("use a loop");
    let executor = FakeBackend::new("executor").with_response("x = 1\n");
    let executor_probe = executor.clone();
    let fx = fixture(consultant, executor);
    let overrides = PromptOverrides::default();

    let trace = recover_file(&context(&fx, &overrides, 2), "fix_me.py", "module", Some("boom")).await;

    assert_eq!(trace.outcome, FileRecovery::Recovered { attempts_used: 1 });
    assert_eq!(trace.guidance.as_deref(), Some("use a loop"));
    // Guidance was prepended to the executor prompt.
    let prompt = executor_probe.last_prompt().unwrap();
    let guidance_pos = prompt.find("use a loop").unwrap();
    assert!(guidance_pos < prompt.find("You are the executor").unwrap());
    // The regenerated file is on disk.
    assert_eq!(
        std::fs::read_to_string(fx.dir.path().join("fix_me.py")).unwrap(),
        "x = 1\n"
    );
}

#[tokio::test]
async fn exhausts_attempts_then_abandons() {
    let consultant = FakeBackend::new("consultant").with_response("advice");
    let executor = FakeBackend::new("executor");
    executor.push_err(ErrorKind::ApiError);
    executor.push_err(ErrorKind::ApiError);
    let executor_probe = executor.clone();
    let fx = fixture(consultant, executor);
    let overrides = PromptOverrides::default();

    let trace = recover_file(&context(&fx, &overrides, 2), "f.py", "", None).await;

    assert!(matches!(trace.outcome, FileRecovery::Abandoned { .. }));
    assert_eq!(executor_probe.call_count(), 2);
    assert_eq!(trace.executor_attempts.len(), 2);
}

#[tokio::test]
async fn consultant_failure_still_tries_executor() {
    let consultant = FakeBackend::new("consultant");
    consultant.push_err(ErrorKind::ApiError);
    let executor = FakeBackend::new("executor").with_response("ok = True\n");
    let fx = fixture(consultant, executor);
    let overrides = PromptOverrides::default();

    let trace = recover_file(&context(&fx, &overrides, 1), "f.py", "", None).await;
    assert_eq!(trace.outcome, FileRecovery::Recovered { attempts_used: 1 });
    assert!(trace.guidance.is_none());
}

#[tokio::test]
async fn cancelled_branch_abandons_immediately() {
    let fx = fixture(FakeBackend::new("c"), FakeBackend::new("e"));
    fx.cancel.cancel();
    let overrides = PromptOverrides::default();
    let trace = recover_file(&context(&fx, &overrides, 3), "f.py", "", None).await;
    assert_eq!(
        trace.outcome,
        FileRecovery::Abandoned { reason: "cancelled".to_string() }
    );
    assert!(trace.executor_attempts.is_empty());
}

#[test]
fn budget_is_minutes_with_a_floor() {
    assert_eq!(recovery_budget(10), Duration::from_secs(600));
    assert_eq!(recovery_budget(0), Duration::from_secs(60));
}
