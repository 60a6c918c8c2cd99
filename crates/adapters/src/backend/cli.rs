// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-backed adapter for generative-model CLI tools

use super::patterns::ErrorPatterns;
use super::process::{run_command, CommandSpec};
use super::{BackendAdapter, BackendError, BackendInfo, ExecuteRequest, ExecuteSuccess};
use async_trait::async_trait;
use orchestra_core::config::{BackendEntry, PromptDelivery};
use orchestra_core::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder in an entry's args, replaced with the prompt.
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Adapter that shells out to a configured CLI backend.
pub struct CliBackend {
    entry: BackendEntry,
    patterns: &'static ErrorPatterns,
    /// Credential value, read once at construction.
    credential: Option<String>,
    /// Base URL override, read once at construction.
    base_url: Option<String>,
}

impl CliBackend {
    pub fn new(entry: BackendEntry) -> Self {
        let credential = entry
            .credential_env
            .as_deref()
            .and_then(|key| std::env::var(key).ok())
            .filter(|v| !v.is_empty());
        let base_url = entry
            .base_url_env
            .as_deref()
            .and_then(|key| std::env::var(key).ok())
            .filter(|v| !v.is_empty());
        Self {
            patterns: ErrorPatterns::for_provider(&entry.provider),
            credential,
            base_url,
            entry,
        }
    }

    pub fn entry(&self) -> &BackendEntry {
        &self.entry
    }

    fn build_spec(&self, prompt: &str, working_dir: Option<&Path>) -> CommandSpec {
        let mut args: Vec<String> = self
            .entry
            .args
            .iter()
            .map(|arg| arg.replace(PROMPT_PLACEHOLDER, prompt))
            .collect();
        let mut stdin = None;
        match self.entry.prompt {
            PromptDelivery::Arg => {
                let has_placeholder = self.entry.args.iter().any(|a| a.contains(PROMPT_PLACEHOLDER));
                if !has_placeholder {
                    args.push(prompt.to_string());
                }
            }
            PromptDelivery::Stdin => stdin = Some(prompt.to_string()),
        }

        let mut env: Vec<(String, String)> = self
            .entry
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let (Some(key), Some(value)) = (self.entry.base_url_env.as_ref(), self.base_url.as_ref())
        {
            env.push((key.clone(), value.clone()));
        }

        CommandSpec {
            command: self.entry.command.clone(),
            args,
            env,
            cwd: working_dir.map(Path::to_path_buf),
            stdin,
            timeout: Duration::from_millis(self.entry.timeout_ms),
        }
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>, duration: Duration) -> BackendError {
        BackendError::new(self.entry.id.clone(), kind, message, duration)
    }
}

/// Locate a binary on PATH.
pub fn find_on_path(command: &str) -> Option<PathBuf> {
    // Absolute or relative invocations bypass the PATH search.
    if command.contains('/') {
        let path = PathBuf::from(command);
        return path.is_file().then_some(path);
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl BackendAdapter for CliBackend {
    async fn execute(&self, request: ExecuteRequest<'_>) -> Result<ExecuteSuccess, BackendError> {
        let spec = self.build_spec(request.prompt, request.working_dir);
        tracing::debug!(
            backend = %self.entry.id,
            command = %spec.command,
            prompt_chars = request.prompt.len(),
            "invoking backend"
        );

        let output = run_command(spec, request.cancel)
            .await
            .map_err(|e| self.error(ErrorKind::ApiError, e.to_string(), Duration::ZERO))?;

        if output.cancelled {
            return Err(self.error(ErrorKind::Cancelled, "cancelled", output.duration));
        }
        if let Some(kind) = self.patterns.classify(&output.stdout, &output.stderr) {
            let message = first_line(&output.stderr)
                .or_else(|| first_line(&output.stdout))
                .unwrap_or_else(|| kind.as_str().to_string());
            return Err(self.error(kind, message, output.duration));
        }
        if output.timed_out {
            return Err(self.error(
                ErrorKind::Timeout,
                format!("timed out after {}ms", self.entry.timeout_ms),
                output.duration,
            ));
        }
        if output.exit_code != Some(0) && output.stdout.trim().is_empty() {
            let message = first_line(&output.stderr)
                .unwrap_or_else(|| format!("exit code {:?}", output.exit_code));
            return Err(self.error(ErrorKind::ApiError, message, output.duration));
        }

        let written = if let Some(path) = request.output_path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.error(ErrorKind::ApiError, e.to_string(), output.duration))?;
            }
            tokio::fs::write(path, &output.stdout)
                .await
                .map_err(|e| self.error(ErrorKind::ApiError, e.to_string(), output.duration))?;
            Some(path.to_path_buf())
        } else {
            None
        };

        Ok(ExecuteSuccess {
            output: output.stdout,
            duration: output.duration,
            output_path: written,
        })
    }

    async fn availability(&self) -> Result<(), String> {
        if find_on_path(&self.entry.command).is_none() {
            return Err(format!("binary '{}' not found on PATH", self.entry.command));
        }
        if self.entry.requires_credential && self.credential.is_none() {
            let key = self.entry.credential_env.as_deref().unwrap_or("credential");
            return Err(format!("credential env {key} is not set"));
        }
        Ok(())
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.entry.id.clone(),
            provider: self.entry.provider.clone(),
            model: self.entry.model.clone(),
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
