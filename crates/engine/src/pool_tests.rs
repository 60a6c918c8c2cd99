// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn results_preserve_input_order() {
    // Later items finish first; slots must still line up with inputs.
    let results = run_pool(
        vec![30u64, 20, 10],
        PoolOptions::with_concurrency(3),
        Cancellation::new(),
        None,
        |index, delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, String>(index * 100 + delay as usize)
        },
    )
    .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Ok(30));
    assert_eq!(results[1], Ok(120));
    assert_eq!(results[2], Ok(210));
}

#[tokio::test]
async fn empty_input_returns_empty() {
    let results = run_pool(
        Vec::<u32>::new(),
        PoolOptions::default(),
        Cancellation::new(),
        None,
        |_, _| async move { Ok::<u32, String>(0) },
    )
    .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let current_op = Arc::clone(&current);
    let peak_op = Arc::clone(&peak);

    run_pool(
        (0..20).collect::<Vec<u32>>(),
        PoolOptions::with_concurrency(3),
        Cancellation::new(),
        None,
        move |_, _| {
            let current = Arc::clone(&current_op);
            let peak = Arc::clone(&peak_op);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        },
    )
    .await;

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn errors_are_isolated_per_slot() {
    let results = run_pool(
        vec![1u32, 2, 3, 4],
        PoolOptions::with_concurrency(2),
        Cancellation::new(),
        None,
        |_, n| async move {
            if n % 2 == 0 {
                Err(format!("item {n} failed"))
            } else {
                Ok(n * 10)
            }
        },
    )
    .await;

    assert_eq!(results[0], Ok(10));
    assert_eq!(results[1], Err(PoolError::Task("item 2 failed".into())));
    assert_eq!(results[2], Ok(30));
    assert_eq!(results[3], Err(PoolError::Task("item 4 failed".into())));
}

#[tokio::test]
async fn cancellation_leaves_sentinel_slots() {
    let cancel = Cancellation::new();
    let canceller = cancel.clone();
    let results = run_pool(
        (0..10).collect::<Vec<u32>>(),
        PoolOptions::with_concurrency(1),
        cancel,
        None,
        move |index, n| {
            let canceller = canceller.clone();
            async move {
                if index == 1 {
                    canceller.cancel();
                }
                Ok::<_, String>(n)
            }
        },
    )
    .await;

    // The in-flight items completed; the rest carry the sentinel.
    assert_eq!(results[0], Ok(0));
    assert_eq!(results[1], Ok(1));
    assert!(results[2..].iter().all(|r| *r == Err(PoolError::Cancelled)));
}

#[tokio::test]
async fn sequential_mode_preserves_completion_order_progress() {
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    let progress: ProgressFn = Arc::new(move |completed, _total| {
        seen_cb.lock().push(completed);
    });

    run_pool(
        (0..4).collect::<Vec<u32>>(),
        PoolOptions {
            max_concurrency: 1,
            min_batch: 1,
            batch_interval: Duration::ZERO,
        },
        Cancellation::new(),
        Some(progress),
        |_, n| async move { Ok::<_, String>(n) },
    )
    .await;

    assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn progress_batches_by_count_and_interval() {
    let fires = Arc::new(AtomicUsize::new(0));
    let fires_cb = Arc::clone(&fires);
    let progress: ProgressFn = Arc::new(move |_c, _t| {
        fires_cb.fetch_add(1, Ordering::SeqCst);
    });

    run_pool(
        (0..50).collect::<Vec<u32>>(),
        PoolOptions {
            max_concurrency: 4,
            min_batch: 10,
            batch_interval: Duration::ZERO,
        },
        Cancellation::new(),
        Some(progress),
        |_, n| async move { Ok::<_, String>(n) },
    )
    .await;

    let count = fires.load(Ordering::SeqCst);
    // Batching caps the fire count well below one-per-item; the final
    // completion always fires.
    assert!(count >= 1);
    assert!(count <= 6, "fired {count} times");
}

#[tokio::test]
async fn final_item_always_fires_progress() {
    let last = Arc::new(Mutex::new((0usize, 0usize)));
    let last_cb = Arc::clone(&last);
    let progress: ProgressFn = Arc::new(move |completed, total| {
        *last_cb.lock() = (completed, total);
    });

    run_pool(
        (0..7).collect::<Vec<u32>>(),
        PoolOptions {
            max_concurrency: 2,
            min_batch: 100,
            batch_interval: Duration::from_secs(3600),
        },
        Cancellation::new(),
        Some(progress),
        |_, n| async move { Ok::<_, String>(n) },
    )
    .await;

    assert_eq!(*last.lock(), (7, 7));
}
