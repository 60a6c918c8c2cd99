// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `validate`: re-run syntax validation on the current plan's files

use anyhow::bail;
use orchestra_core::Config;
use orchestra_engine::{AutoApprove, KernelOptions, Orchestrator};
use std::path::Path;
use std::sync::Arc;

pub async fn run(root: &Path) -> anyhow::Result<()> {
    let (config, config_path) = Config::load_or_default(root)?;
    let options = KernelOptions {
        config_path,
        ..Default::default()
    };
    let orch = Orchestrator::from_config(root, config, options, Arc::new(AutoApprove))?;
    let summary = orch.validate_latest().await?;

    for (path, outcome, detail) in &summary.rows {
        match detail {
            Some(detail) => println!("{outcome:>7}  {path}  ({detail})"),
            None => println!("{outcome:>7}  {path}"),
        }
    }
    println!(
        "checked {}: {} passed, {} failed, {} skipped",
        summary.rows.len(),
        summary.passed,
        summary.failed,
        summary.skipped
    );
    if summary.failed > 0 {
        bail!("{} file(s) failed syntax validation", summary.failed);
    }
    Ok(())
}
