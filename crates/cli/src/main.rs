// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! orchestra - multi-agent orchestration CLI

mod commands;
mod gate;
mod output;

use clap::{Parser, Subcommand};
use commands::{cache, clean, doctor, history, init, plan, resume, start, status, validate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "orchestra",
    version,
    about = "Orchestra - turn a development task into reviewed source files"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session and run the kernel once
    Start(start::StartArgs),
    /// Continue the most recent resumable session
    Resume,
    /// Run with per-file generate -> audit scheduling
    Pipeline(start::PipelineArgs),
    /// Run, then re-run on watched file changes
    Watch(start::WatchArgs),
    /// Show the current session
    Status,
    /// Print the current plan
    Plan,
    /// Remove the current session directory
    Clean,
    /// Re-run syntax validation on the current plan's files
    Validate,
    /// Probe each configured backend and its environment
    Doctor,
    /// Write a default configuration file
    Init,
    /// Query past sessions
    History(history::HistoryArgs),
    /// Prompt cache administration
    Cache(cache::CacheArgs),
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(engine) = err.downcast_ref::<orchestra_engine::EngineError>() {
        if engine.is_config() {
            return 2;
        }
    }
    if err.downcast_ref::<orchestra_core::ConfigError>().is_some() {
        return 2;
    }
    1
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    match cli.command {
        Commands::Start(args) => start::run(&root, args).await,
        Commands::Resume => resume::run(&root).await,
        Commands::Pipeline(args) => start::run_pipeline(&root, args).await,
        Commands::Watch(args) => start::run_watch(&root, args).await,
        Commands::Status => status::run(&root),
        Commands::Plan => plan::run(&root),
        Commands::Clean => clean::run(&root),
        Commands::Validate => validate::run(&root).await,
        Commands::Doctor => doctor::run(&root).await,
        Commands::Init => init::run(&root),
        Commands::History(args) => history::run(&root, args),
        Commands::Cache(args) => cache::run(&root, args),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            // One line to stderr, always.
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
