// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded parallel worker pool
//!
//! Workers cooperate through a shared FIFO queue seeded with indexed items.
//! Results land at their item's index, so output order always matches input
//! order regardless of completion order. A failing operation fills its own
//! slot; the rest of the pool keeps going.

use orchestra_adapters::Cancellation;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Sentinel for slots never processed because the pool was cancelled.
    #[error("cancelled before execution")]
    Cancelled,
    /// The operation failed; other workers continued.
    #[error("{0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_concurrency: usize,
    /// Progress fires only after at least this many completions...
    pub min_batch: usize,
    /// ...and at least this much wall-clock since the previous fire.
    pub batch_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            min_batch: 1,
            batch_interval: Duration::from_millis(100),
        }
    }
}

impl PoolOptions {
    pub fn with_concurrency(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            ..Self::default()
        }
    }
}

/// Batched progress callback: (completed, total).
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

struct ProgressState {
    completed: usize,
    reported: usize,
    last_fire: Instant,
}

/// Run `op` over `items` with bounded concurrency.
///
/// The returned vector has one slot per input item, in input order. A
/// cancelled pool lets in-flight operations finish and fills untouched
/// slots with [`PoolError::Cancelled`].
pub async fn run_pool<T, R, F, Fut>(
    items: Vec<T>,
    options: PoolOptions,
    cancel: Cancellation,
    progress: Option<ProgressFn>,
    op: F,
) -> Vec<Result<R, PoolError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, String>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let results: Arc<Mutex<Vec<Option<Result<R, PoolError>>>>> =
        Arc::new(Mutex::new((0..total).map(|_| None).collect()));
    let progress_state = Arc::new(Mutex::new(ProgressState {
        completed: 0,
        reported: 0,
        last_fire: Instant::now(),
    }));
    let op = Arc::new(op);

    let workers = options.max_concurrency.max(1).min(total);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let results = Arc::clone(&results);
        let progress_state = Arc::clone(&progress_state);
        let progress = progress.clone();
        let cancel = cancel.clone();
        let op = Arc::clone(&op);
        let options = options.clone();

        handles.push(tokio::spawn(async move {
            loop {
                // Workers exit at their next queue check once cancelled;
                // the in-flight operation below is allowed to complete.
                if cancel.is_cancelled() {
                    break;
                }
                let next = queue.lock().pop_front();
                let Some((index, item)) = next else {
                    break;
                };

                let result = op(index, item).await.map_err(PoolError::Task);
                results.lock()[index] = Some(result);

                let fire = {
                    let mut state = progress_state.lock();
                    state.completed += 1;
                    let due = state.completed - state.reported >= options.min_batch
                        && state.last_fire.elapsed() >= options.batch_interval;
                    let last = state.completed == total;
                    if due || last {
                        state.reported = state.completed;
                        state.last_fire = Instant::now();
                        Some(state.completed)
                    } else {
                        None
                    }
                };
                if let (Some(completed), Some(progress)) = (fire, progress.as_ref()) {
                    progress(completed, total);
                }
            }
        }));
    }

    for handle in handles {
        // A worker panic poisons nothing; its queue share is drained by the
        // remaining workers or reported as cancelled slots below.
        let _ = handle.await;
    }

    let mut slots = results.lock();
    slots
        .iter_mut()
        .map(|slot| slot.take().unwrap_or(Err(PoolError::Cancelled)))
        .collect()
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
