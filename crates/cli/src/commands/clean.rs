// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clean`: remove the current session directory

use orchestra_core::SystemClock;
use orchestra_storage::SessionStore;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let store = SessionStore::new(root, SystemClock);
    match store.latest()? {
        Some(summary) => {
            store.clear(summary.id.as_str())?;
            println!("removed session {}", summary.id.short(8));
        }
        None => println!("nothing to clean"),
    }
    Ok(())
}
