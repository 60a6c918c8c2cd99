// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchestra_core::config::PromptDelivery;
use std::collections::HashMap;

fn entry(id: &str, command: &str) -> BackendEntry {
    BackendEntry {
        id: id.to_string(),
        provider: "fake".to_string(),
        model: "m".to_string(),
        command: command.to_string(),
        args: Vec::new(),
        prompt: PromptDelivery::Arg,
        env: HashMap::new(),
        credential_env: Some("ORCHESTRA_DOCTOR_TEST_UNSET".to_string()),
        requires_credential: false,
        base_url_env: None,
        timeout_ms: 1_000,
        context_window: 1_000,
        cost_per_1k_tokens: 0.0,
    }
}

#[tokio::test]
async fn reports_available_and_missing_backends() {
    let entries = vec![entry("present", "sh"), entry("absent", "no-such-backend-binary")];
    let reports = probe_backends(&entries).await;
    assert_eq!(reports.len(), 2);

    assert!(reports[0].available);
    assert!(reports[0].reason.is_none());

    assert!(!reports[1].available);
    assert!(reports[1].reason.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn reports_env_presence() {
    let reports = probe_backends(&[entry("present", "sh")]).await;
    let (key, set) = reports[0].credential_env.clone().unwrap();
    assert_eq!(key, "ORCHESTRA_DOCTOR_TEST_UNSET");
    assert!(!set);
    assert!(reports[0].base_url_env.is_none());
}
