// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `status`: show the current session

use crate::output::summary_line;
use orchestra_core::SystemClock;
use orchestra_storage::SessionStore;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let store = SessionStore::new(root, SystemClock);
    match store.latest()? {
        Some(summary) => {
            println!("{}", summary_line(&summary));
            if summary.phase.is_resumable() {
                println!("resumable: run `orchestra resume` to continue");
            }
        }
        None => println!("no sessions"),
    }
    Ok(())
}
