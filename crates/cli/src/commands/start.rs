// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `start`, `pipeline`, and `watch`: the commands that drive the kernel

use crate::gate::StdinGate;
use crate::output::outcome_line;
use anyhow::{bail, Context};
use orchestra_core::{Config, Phase};
use orchestra_engine::{
    ApprovalGate, AutoApprove, KernelOptions, Orchestrator, RunMode, SessionOutcome,
};
use std::path::Path;
use std::sync::Arc;

#[derive(clap::Args, Debug)]
pub struct StartArgs {
    /// The task to perform
    #[arg(required = true, trailing_var_arg = true)]
    pub task: Vec<String>,
    /// Skip plan approval
    #[arg(long)]
    pub auto: bool,
    /// Generate files in parallel
    #[arg(long)]
    pub parallel: bool,
    /// Max concurrent file workers
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
    /// Run the test command after generation
    #[arg(long)]
    pub test: bool,
    /// Override the test command
    #[arg(long = "test-command", value_name = "CMD")]
    pub test_command: Option<String>,
    /// Commit the result
    #[arg(long)]
    pub commit: bool,
    /// Commit message template ({task} expands)
    #[arg(long = "commit-message", value_name = "TMPL")]
    pub commit_message: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PipelineArgs {
    /// The task to perform
    #[arg(required = true, trailing_var_arg = true)]
    pub task: Vec<String>,
    /// Max concurrent file workers
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// The task to perform
    #[arg(required = true, trailing_var_arg = true)]
    pub task: Vec<String>,
    /// Skip plan approval
    #[arg(long)]
    pub auto: bool,
}

impl StartArgs {
    fn options(&self, config_path: Option<std::path::PathBuf>) -> KernelOptions {
        KernelOptions {
            mode: RunMode::Standard,
            auto_approve: self.auto,
            parallel: self.parallel.then_some(true),
            max_concurrency: self.concurrency,
            run_tests: self.test,
            test_command: self.test_command.clone(),
            commit: self.commit,
            commit_message: self.commit_message.clone(),
            config_path,
        }
    }
}

fn join_task(words: &[String]) -> String {
    words.join(" ")
}

fn gate_for(auto: bool) -> Arc<dyn ApprovalGate> {
    if auto {
        Arc::new(AutoApprove)
    } else {
        Arc::new(StdinGate)
    }
}

/// Build the orchestrator, verify at least one backend per role, and hook
/// ctrl-c into the session's cancellation signal.
async fn orchestrator(
    root: &Path,
    config: Config,
    options: KernelOptions,
    gate: Arc<dyn ApprovalGate>,
) -> anyhow::Result<Orchestrator<orchestra_core::SystemClock, orchestra_core::UuidIdGen>> {
    let orch = Orchestrator::from_config(root, config, options, gate)?;
    orch.ensure_available().await?;
    let cancel = orch.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling session");
            cancel.cancel();
        }
    });
    Ok(orch)
}

/// Print the one-line summary or turn a terminal failure into the exit-1
/// error line.
pub fn report(root: &Path, outcome: SessionOutcome) -> anyhow::Result<()> {
    match outcome.phase {
        Phase::Completed => {
            println!("{}", outcome_line(&outcome));
            Ok(())
        }
        phase => {
            let session_json = root
                .join(orchestra_storage::STORE_DIR_NAME)
                .join(outcome.session_id.as_str())
                .join("session.json");
            bail!(
                "session {} ended in {}: {} (state: {})",
                outcome.session_id.short(8),
                phase,
                outcome.error.as_deref().unwrap_or("see session log"),
                session_json.display()
            )
        }
    }
}

pub async fn run(root: &Path, args: StartArgs) -> anyhow::Result<()> {
    let (config, config_path) = Config::load_or_default(root)?;
    let gate = gate_for(args.auto);
    let orch = orchestrator(root, config, args.options(config_path), gate).await?;
    let outcome = orch
        .run(&join_task(&args.task))
        .await
        .context("run failed")?;
    report(root, outcome)
}

pub async fn run_pipeline(root: &Path, args: PipelineArgs) -> anyhow::Result<()> {
    let (config, config_path) = Config::load_or_default(root)?;
    let options = KernelOptions {
        mode: RunMode::Pipeline,
        auto_approve: true,
        parallel: Some(true),
        max_concurrency: args.concurrency,
        config_path,
        ..Default::default()
    };
    let orch = orchestrator(root, config, options, Arc::new(AutoApprove)).await?;
    let outcome = orch
        .run(&join_task(&args.task))
        .await
        .context("pipeline run failed")?;
    report(root, outcome)
}

pub async fn run_watch(root: &Path, args: WatchArgs) -> anyhow::Result<()> {
    let (config, config_path) = Config::load_or_default(root)?;
    let options = KernelOptions {
        auto_approve: args.auto,
        config_path,
        ..Default::default()
    };
    let gate = gate_for(args.auto);
    let orch = orchestrator(root, config, options, gate).await?;
    let outcome = orch
        .watch_loop(&join_task(&args.task))
        .await
        .context("watch run failed")?;
    report(root, outcome)
}

#[cfg(test)]
#[path = "start_tests.rs"]
mod tests;
