// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `doctor`: probe each configured backend and its environment

use anyhow::bail;
use orchestra_adapters::{merge_backends, probe_backends};
use orchestra_core::Config;
use std::path::Path;

fn env_marker(pair: &Option<(String, bool)>) -> String {
    match pair {
        Some((key, true)) => format!("{key}=set"),
        Some((key, false)) => format!("{key}=unset"),
        None => "-".to_string(),
    }
}

pub async fn run(root: &Path) -> anyhow::Result<()> {
    let (config, _path) = Config::load_or_default(root)?;
    let entries = merge_backends(&config.backends);
    let reports = probe_backends(&entries).await;

    let mut available = 0;
    for report in &reports {
        let state = if report.available {
            available += 1;
            "ok".to_string()
        } else {
            format!("unavailable ({})", report.reason.as_deref().unwrap_or("?"))
        };
        println!(
            "{:10} {:10} {:20} {}  [{} {}]",
            report.backend,
            report.provider,
            report.model,
            state,
            env_marker(&report.credential_env),
            env_marker(&report.base_url_env),
        );
    }

    if available == 0 {
        bail!(orchestra_engine::EngineError::NoBackendAvailable {
            reasons: reports
                .iter()
                .filter_map(|r| r.reason.clone())
                .collect()
        });
    }
    println!("{available}/{} backends available", reports.len());
    Ok(())
}
