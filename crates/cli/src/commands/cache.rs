// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cache`: prompt cache administration

use anyhow::bail;
use orchestra_storage::{PromptCache, STORE_DIR_NAME};
use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct CacheArgs {
    /// Print entry count, total size, and hit count
    #[arg(long)]
    pub stats: bool,
    /// Remove every cache entry
    #[arg(long)]
    pub clear: bool,
    /// List entries, most recently used first
    #[arg(long)]
    pub list: bool,
}

pub fn run(root: &Path, args: CacheArgs) -> anyhow::Result<()> {
    let selected = [args.stats, args.clear, args.list]
        .iter()
        .filter(|b| **b)
        .count();
    if selected != 1 {
        bail!("cache needs exactly one of --stats, --clear, --list");
    }

    let cache = PromptCache::new(&root.join(STORE_DIR_NAME));
    if args.stats {
        let stats = cache.stats()?;
        println!(
            "{} entries, {} bytes, {} hits",
            stats.entries, stats.total_bytes, stats.total_hits
        );
    } else if args.clear {
        let removed = cache.clear()?;
        println!("removed {removed} entries");
    } else {
        let entries = cache.list()?;
        if entries.is_empty() {
            println!("cache is empty");
        }
        for entry in entries {
            println!(
                "{}  {:10} {:>8}B  {:>4} hits",
                &entry.key[..16.min(entry.key.len())],
                entry.backend,
                entry.response_bytes,
                entry.hits,
            );
        }
    }
    Ok(())
}
