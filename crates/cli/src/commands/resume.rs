// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `resume`: continue the most recent resumable session

use super::start::report;
use anyhow::Context;
use orchestra_core::Config;
use orchestra_engine::{AutoApprove, KernelOptions, Orchestrator};
use std::path::Path;
use std::sync::Arc;

pub async fn run(root: &Path) -> anyhow::Result<()> {
    let (config, config_path) = Config::load_or_default(root)?;
    let options = KernelOptions {
        // The plan was already approved before the interruption.
        auto_approve: true,
        config_path,
        ..Default::default()
    };
    let orch = Orchestrator::from_config(root, config, options, Arc::new(AutoApprove))?;
    orch.ensure_available().await?;
    let cancel = orch.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let outcome = orch.resume().await.context("resume failed")?;
    report(root, outcome)
}
