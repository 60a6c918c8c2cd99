// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-file recovery branch
//!
//! For each persistently failing file: ask the Consultant for targeted
//! guidance, then re-run the Executor with that guidance prepended, up to
//! `maxRecoveryAttempts` rounds. The whole branch shares one wall-clock
//! budget (`recoveryTimeout`); on exhaustion the file is reverted to its
//! pre-phase checkpoint (when `autoRevertOnFailure`) and abandoned.

use crate::invoke::Invoker;
use crate::prompts;
use crate::syntax::SyntaxValidator;
use orchestra_adapters::{Cancellation, FallbackChain};
use orchestra_core::config::PromptOverrides;
use orchestra_core::{Clock, Event, EventSink, ModelAttempt, SyntaxOutcome};
use std::path::Path;
use std::time::Duration;

/// What happened to one file in the branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRecovery {
    /// The executor produced a syntactically valid file again.
    Recovered { attempts_used: u32 },
    /// All attempts failed or the branch ran out of time.
    Abandoned { reason: String },
}

/// Step-level records produced while recovering one file.
#[derive(Debug, Clone)]
pub struct RecoveryTrace {
    pub path: String,
    pub outcome: FileRecovery,
    pub consultant_attempts: Vec<ModelAttempt>,
    pub executor_attempts: Vec<ModelAttempt>,
    /// Guidance text of the last consultant round.
    pub guidance: Option<String>,
}

pub struct RecoveryContext<'a, C: Clock> {
    pub invoker: &'a Invoker<C>,
    pub consultant_chain: &'a FallbackChain,
    pub executor_chain: &'a FallbackChain,
    pub validator: &'a SyntaxValidator,
    pub sink: &'a dyn EventSink,
    pub overrides: &'a PromptOverrides,
    pub project_root: &'a Path,
    pub task: &'a str,
    pub max_attempts: u32,
    pub cancel: &'a Cancellation,
}

/// Recover a single file. The caller applies status transitions and the
/// branch-level timeout.
pub async fn recover_file<C: Clock>(
    cx: &RecoveryContext<'_, C>,
    path: &str,
    summary: &str,
    last_error: Option<&str>,
) -> RecoveryTrace {
    let mut trace = RecoveryTrace {
        path: path.to_string(),
        outcome: FileRecovery::Abandoned {
            reason: "no attempts made".to_string(),
        },
        consultant_attempts: Vec::new(),
        executor_attempts: Vec::new(),
        guidance: None,
    };
    let mut last_error = last_error.map(str::to_string);

    for attempt in 1..=cx.max_attempts.max(1) {
        if cx.cancel.is_cancelled() {
            trace.outcome = FileRecovery::Abandoned {
                reason: "cancelled".to_string(),
            };
            return trace;
        }

        // (a) Consultant: targeted algorithmic guidance from the file context.
        let current = std::fs::read_to_string(cx.project_root.join(path)).ok();
        let consultant_prompt = prompts::consultant(
            cx.overrides,
            cx.task,
            path,
            last_error.as_deref(),
            current.as_deref(),
        );
        let guidance = match cx
            .invoker
            .invoke(cx.consultant_chain, &consultant_prompt, None, None, cx.cancel)
            .await
        {
            Ok(outcome) => {
                trace.consultant_attempts.extend(outcome.attempts);
                cx.sink.emit(Event::Consultant {
                    path: path.to_string(),
                    guidance: outcome.text.clone(),
                });
                Some(outcome.text)
            }
            Err((error, attempts)) => {
                trace.consultant_attempts.extend(attempts);
                tracing::warn!(path, %error, "consultant unavailable, retrying executor bare");
                None
            }
        };
        trace.guidance = guidance.clone();

        // (b) Executor, guidance prepended.
        let directive = orchestra_core::FileDirective {
            path: path.to_string(),
            summary: summary.to_string(),
        };
        let executor_prompt =
            prompts::executor(cx.overrides, cx.task, &directive, guidance.as_deref());
        let target = cx.project_root.join(path);
        match cx
            .invoker
            .invoke(
                cx.executor_chain,
                &executor_prompt,
                Some(&target),
                Some(cx.project_root),
                cx.cancel,
            )
            .await
        {
            Ok(outcome) => {
                trace.executor_attempts.extend(outcome.attempts);
                let (syntax, detail) = cx.validator.check(&target, cx.cancel).await;
                cx.sink.emit(Event::SyntaxCheck {
                    path: path.to_string(),
                    outcome: syntax,
                    detail: detail.clone(),
                });
                if syntax == SyntaxOutcome::Failed {
                    last_error = detail.or(Some("syntax check failed".to_string()));
                    continue;
                }
                trace.outcome = FileRecovery::Recovered {
                    attempts_used: attempt,
                };
                return trace;
            }
            Err((error, attempts)) => {
                trace.executor_attempts.extend(attempts);
                last_error = Some(error.to_string());
            }
        }
    }

    trace.outcome = FileRecovery::Abandoned {
        reason: last_error.unwrap_or_else(|| "recovery attempts exhausted".to_string()),
    };
    trace
}

/// Branch-level timeout from the configured minutes.
pub fn recovery_budget(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(1) * 60)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
