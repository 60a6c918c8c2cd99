// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;
use std::path::Path;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn start_parses_task_and_flags() {
    let cli = parse(&[
        "orchestra",
        "start",
        "--auto",
        "--parallel",
        "--concurrency",
        "4",
        "--test",
        "--commit",
        "build",
        "a",
        "parser",
    ]);
    match cli.command {
        Commands::Start(args) => {
            assert!(args.auto);
            assert!(args.parallel);
            assert_eq!(args.concurrency, Some(4));
            assert!(args.test);
            assert!(args.commit);
            assert_eq!(args.task, ["build", "a", "parser"]);
        }
        _ => panic!("expected start"),
    }
}

#[test]
fn start_requires_a_task() {
    assert!(Cli::try_parse_from(["orchestra", "start"]).is_err());
}

#[test]
fn global_directory_flag() {
    let cli = parse(&["orchestra", "-C", "/somewhere", "status"]);
    assert_eq!(cli.directory.as_deref(), Some(Path::new("/somewhere")));
    assert!(matches!(cli.command, Commands::Status));
}

#[test]
fn history_filters_parse() {
    let cli = parse(&[
        "orchestra", "history", "--limit", "5", "--status", "completed", "--search", "parser",
    ]);
    match cli.command {
        Commands::History(args) => {
            assert_eq!(args.limit, Some(5));
            assert_eq!(args.status, Some(orchestra_core::Phase::Completed));
            assert_eq!(args.search.as_deref(), Some("parser"));
        }
        _ => panic!("expected history"),
    }
}

#[test]
fn history_rejects_unknown_phase() {
    assert!(Cli::try_parse_from(["orchestra", "history", "--status", "bogus"]).is_err());
}

#[test]
fn cache_flags_parse() {
    let cli = parse(&["orchestra", "cache", "--stats"]);
    match cli.command {
        Commands::Cache(args) => assert!(args.stats && !args.clear && !args.list),
        _ => panic!("expected cache"),
    }
}

#[test]
fn simple_commands_parse() {
    for name in ["resume", "status", "plan", "clean", "validate", "doctor", "init"] {
        let cli = parse(&["orchestra", name]);
        let matched = matches!(
            (name, &cli.command),
            ("resume", Commands::Resume)
                | ("status", Commands::Status)
                | ("plan", Commands::Plan)
                | ("clean", Commands::Clean)
                | ("validate", Commands::Validate)
                | ("doctor", Commands::Doctor)
                | ("init", Commands::Init)
        );
        assert!(matched, "command {name} did not parse");
    }
}

#[test]
fn exit_codes_for_error_kinds() {
    let config_err = anyhow::Error::new(orchestra_engine::EngineError::NoBackendAvailable {
        reasons: vec!["none".into()],
    });
    assert_eq!(exit_code_for(&config_err), 2);

    let plain = anyhow::anyhow!("something went wrong");
    assert_eq!(exit_code_for(&plain), 1);
}
