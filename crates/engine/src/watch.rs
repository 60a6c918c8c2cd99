// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch mode
//!
//! After a completed run, observe the plan's paths for content changes and
//! fire a debounced callback per change burst. The watcher runs until the
//! cancellation token fires.

use notify::{RecursiveMode, Watcher};
use orchestra_adapters::Cancellation;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Observe `paths` (relative to `project_root`); on a debounced change call
/// `on_change` with the sorted set of changed paths.
pub async fn watch_paths(
    project_root: &Path,
    paths: &[String],
    debounce: Duration,
    cancel: &Cancellation,
    on_change: impl Fn(Vec<String>),
) -> Result<(), notify::Error> {
    let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(64);

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        if let Ok(event) = res {
            if matches!(
                event.kind,
                notify::EventKind::Modify(_) | notify::EventKind::Create(_)
            ) {
                let _ = tx.blocking_send(event.paths);
            }
        }
    })?;

    let mut watched = 0;
    for path in paths {
        let absolute = project_root.join(path);
        if absolute.exists() {
            watcher.watch(&absolute, RecursiveMode::NonRecursive)?;
            watched += 1;
        }
    }
    tracing::info!(watched, total = paths.len(), "watch mode active");

    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            changed = rx.recv() => changed,
        };
        let Some(first) = first else {
            return Ok(());
        };

        // Debounce: keep draining until the burst goes quiet.
        let mut changed: BTreeSet<PathBuf> = first.into_iter().collect();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                more = tokio::time::timeout(debounce, rx.recv()) => match more {
                    Ok(Some(paths)) => changed.extend(paths),
                    Ok(None) => return Ok(()),
                    Err(_) => break,
                }
            }
        }

        let relative: Vec<String> = changed
            .iter()
            .map(|p| {
                p.strip_prefix(project_root)
                    .unwrap_or(p)
                    .display()
                    .to_string()
            })
            .collect();
        on_change(relative);
    }
}

/// Wait for exactly one debounced change burst.
///
/// Returns `Ok(None)` when the outer cancellation fires first.
pub async fn watch_once(
    project_root: &Path,
    paths: &[String],
    debounce: Duration,
    cancel: &Cancellation,
) -> Result<Option<Vec<String>>, notify::Error> {
    let burst = Cancellation::new();
    let captured: std::sync::Arc<parking_lot::Mutex<Option<Vec<String>>>> =
        std::sync::Arc::new(parking_lot::Mutex::new(None));

    let stop_on_burst = burst.clone();
    let sink = std::sync::Arc::clone(&captured);
    let watcher = watch_paths(project_root, paths, debounce, &burst, move |changed| {
        *sink.lock() = Some(changed);
        stop_on_burst.cancel();
    });

    tokio::select! {
        result = watcher => result?,
        _ = cancel.cancelled() => {
            burst.cancel();
            return Ok(None);
        }
    }
    let changed = captured.lock().take();
    Ok(changed)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
