// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `plan`: print the current session's plan

use anyhow::bail;
use orchestra_core::SystemClock;
use orchestra_storage::SessionStore;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let store = SessionStore::new(root, SystemClock);
    let Some(summary) = store.latest()? else {
        bail!("no sessions");
    };
    match store.load_plan(&summary.id)? {
        Some(plan) => {
            print!("{plan}");
            Ok(())
        }
        None => bail!("session {} has no plan yet", summary.id.short(8)),
    }
}
