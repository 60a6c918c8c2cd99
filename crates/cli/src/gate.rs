// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive plan approval over stdin

use async_trait::async_trait;
use orchestra_engine::{Approval, ApprovalGate};
use std::path::Path;

pub struct StdinGate;

#[async_trait]
impl ApprovalGate for StdinGate {
    async fn decide(&self, plan: &str, plan_path: &Path) -> Approval {
        println!("{plan}");
        eprintln!(
            "plan written to {} - approve? [y]es / [n]o / [e]dited the file: ",
            plan_path.display()
        );
        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            let _ = std::io::stdin().read_line(&mut buf);
            buf
        })
        .await
        .unwrap_or_default();

        parse_answer(&line)
    }
}

fn parse_answer(line: &str) -> Approval {
    match line.trim().chars().next() {
        Some('y') | Some('Y') => Approval::Approve,
        Some('e') | Some('E') => Approval::Edit,
        _ => Approval::Reject,
    }
}
