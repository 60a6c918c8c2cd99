// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent invocation
//!
//! Wraps a role's fallback chain with the context-compaction retry loop and
//! turns chain attempts into step-level [`ModelAttempt`] records. Transient
//! failures never surface here: rate limits rotate inside the chain,
//! context-exceeded triggers compaction, and everything else comes back to
//! the kernel classified.

use orchestra_adapters::{Cancellation, ChainAttempt, ChainError, FallbackChain};
use orchestra_adapters::backend::ExecuteRequest;
use orchestra_core::compact::{compact, estimate_tokens, DEFAULT_TARGET};
use orchestra_core::{Clock, ErrorKind, ModelAttempt};
use orchestra_storage::PromptCache;
use std::collections::HashMap;
use std::path::Path;

/// Retries allowed for context-exceeded, each with a freshly compacted
/// prompt.
pub const MAX_COMPACTION_RETRIES: u32 = 2;

/// Result of one logical agent call.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    pub text: String,
    pub backend: String,
    pub attempts: Vec<ModelAttempt>,
    pub duration_ms: u64,
    /// Compaction rounds the prompt went through before succeeding.
    pub compactions: u32,
    pub from_cache: bool,
}

/// Chain caller shared by the kernel's phases.
pub struct Invoker<C: Clock> {
    clock: C,
    /// cost per 1k tokens, by backend id.
    costs: HashMap<String, f64>,
    cache: Option<PromptCache>,
    use_cache: bool,
}

impl<C: Clock> Invoker<C> {
    pub fn new(clock: C, costs: HashMap<String, f64>) -> Self {
        Self {
            clock,
            costs,
            cache: None,
            use_cache: false,
        }
    }

    /// Attach a prompt cache. Reads stay off unless `use_cache` is set;
    /// writes are always recorded for `orchestra cache` administration.
    pub fn with_cache(mut self, cache: PromptCache, use_cache: bool) -> Self {
        self.cache = Some(cache);
        self.use_cache = use_cache;
        self
    }

    fn record_attempts(
        &self,
        prompt: &str,
        output_len: usize,
        attempts: &[ChainAttempt],
    ) -> Vec<ModelAttempt> {
        attempts
            .iter()
            .map(|attempt| {
                let tokens = attempt
                    .success
                    .then(|| estimate_tokens(prompt) + (output_len as u64).div_ceil(4));
                let cost = tokens
                    .map(|t| t as f64 / 1000.0 * self.costs.get(&attempt.backend).copied().unwrap_or(0.0))
                    .unwrap_or(0.0);
                ModelAttempt {
                    backend: attempt.backend.clone(),
                    provider: attempt.provider.clone(),
                    tokens_used: tokens,
                    latency_ms: attempt.duration.as_millis() as u64,
                    success: attempt.success,
                    error_kind: attempt.error_kind,
                    at_epoch_ms: self.clock.epoch_ms(),
                    estimated_cost: cost,
                }
            })
            .collect()
    }

    /// Execute `prompt` through `chain`, compacting and retrying when a
    /// backend reports the prompt as too large (at most
    /// [`MAX_COMPACTION_RETRIES`] retries per logical call).
    pub async fn invoke(
        &self,
        chain: &FallbackChain,
        prompt: &str,
        output_path: Option<&Path>,
        working_dir: Option<&Path>,
        cancel: &Cancellation,
    ) -> Result<InvokeOutcome, (ChainError, Vec<ModelAttempt>)> {
        if self.use_cache {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get("chain", prompt, self.clock.epoch_ms()) {
                    return Ok(InvokeOutcome {
                        text: hit,
                        backend: "cache".to_string(),
                        attempts: Vec::new(),
                        duration_ms: 0,
                        compactions: 0,
                        from_cache: true,
                    });
                }
            }
        }

        let mut current = prompt.to_string();
        let mut all_attempts: Vec<ModelAttempt> = Vec::new();
        let mut compactions = 0u32;

        loop {
            let request = ExecuteRequest {
                prompt: &current,
                output_path,
                working_dir,
                cancel,
            };
            match chain.execute(request).await {
                Ok(success) => {
                    all_attempts.extend(self.record_attempts(
                        &current,
                        success.result.output.len(),
                        &success.attempts,
                    ));
                    if let Some(cache) = &self.cache {
                        let _ = cache.put(
                            "chain",
                            prompt,
                            &success.result.output,
                            self.clock.epoch_ms(),
                        );
                    }
                    return Ok(InvokeOutcome {
                        text: success.result.output,
                        backend: success.backend,
                        duration_ms: success.result.duration.as_millis() as u64,
                        attempts: all_attempts,
                        compactions,
                        from_cache: false,
                    });
                }
                Err(error) => {
                    all_attempts.extend(self.record_attempts(&current, 0, error.attempts()));
                    if error.kind() == ErrorKind::ContextExceeded
                        && compactions < MAX_COMPACTION_RETRIES
                    {
                        let result = compact(&current, DEFAULT_TARGET);
                        compactions += 1;
                        tracing::info!(
                            round = compactions,
                            from = result.original_len,
                            to = result.compacted_len,
                            "prompt compacted after context-exceeded"
                        );
                        current = result.compacted;
                        continue;
                    }
                    return Err((error, all_attempts));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "invoke_tests.rs"]
mod tests;
