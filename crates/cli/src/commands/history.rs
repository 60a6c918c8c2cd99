// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `history`: query past sessions

use crate::output::summary_line;
use orchestra_core::{Phase, SystemClock};
use orchestra_storage::{HistoryFilter, SessionStore};
use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    /// Show at most this many sessions
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
    /// Filter by phase (e.g. completed, failed, executing)
    #[arg(long, value_name = "PHASE")]
    pub status: Option<Phase>,
    /// Full-text search in task and plan
    #[arg(long, value_name = "QUERY")]
    pub search: Option<String>,
}

pub fn run(root: &Path, args: HistoryArgs) -> anyhow::Result<()> {
    let store = SessionStore::new(root, SystemClock);
    let filter = HistoryFilter {
        limit: args.limit,
        status: args.status,
        search: args.search,
    };
    let summaries = store.list(&filter)?;
    if summaries.is_empty() {
        println!("no sessions");
        return Ok(());
    }
    for summary in &summaries {
        println!("{}", summary_line(summary));
    }
    Ok(())
}
