// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration
//!
//! A single JSON document (`orchestra.json`) at the project root. Every
//! section has serde defaults so a partial file works; unknown adapters and
//! invalid bounds are rejected up front with [`ConfigError`], which the CLI
//! maps to exit code 2 before any session state is touched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "orchestra.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Languages eligible for syntax validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Go,
    Rust,
    Json,
    Yaml,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Go,
        Language::Rust,
        Language::Json,
        Language::Yaml,
    ];

    /// Language inferred from a path's extension.
    pub fn from_path(path: &str) -> Option<Language> {
        let ext = Path::new(path).extension()?.to_str()?;
        match ext {
            "py" => Some(Language::Python),
            "js" | "mjs" | "cjs" => Some(Language::Javascript),
            "ts" | "tsx" => Some(Language::Typescript),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "json" => Some(Language::Json),
            "yaml" | "yml" => Some(Language::Yaml),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Json => "json",
            Language::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a CLI backend receives its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptDelivery {
    /// Appended as the final argument.
    #[default]
    Arg,
    /// Written to the child's stdin.
    Stdin,
}

/// Static configuration of one backend adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendEntry {
    pub id: String,
    pub provider: String,
    pub model: String,
    /// Binary to invoke.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub prompt: PromptDelivery,
    /// Environment overlays applied to the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Env var holding the credential; probed by `isAvailable` when the
    /// binary check alone is insufficient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_env: Option<String>,
    /// Whether availability requires the credential env to be set. CLI tools
    /// with their own login flow leave this off.
    #[serde(default)]
    pub requires_credential: bool,
    /// Env var overriding the provider's base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_env: Option<String>,
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
    /// Context window in tokens.
    #[serde(default = "default_context_window")]
    pub context_window: u64,
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
}

fn default_backend_timeout_ms() -> u64 {
    300_000
}

fn default_context_window() -> u64 {
    128_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Per-adapter invocation timeout.
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout: u64,
}

fn default_concurrency() -> usize {
    3
}

fn default_max_iterations() -> u32 {
    3
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: default_concurrency(),
            max_iterations: default_max_iterations(),
            timeout: default_backend_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    /// Autodetected by file-existence probes when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub run_after_generation: bool,
    #[serde(default = "default_test_timeout_ms")]
    pub timeout: u64,
}

fn default_test_timeout_ms() -> u64 {
    120_000
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            command: None,
            run_after_generation: false,
            timeout: default_test_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    #[serde(default)]
    pub auto_commit: bool,
    /// `{task}` expands to the session task.
    #[serde(default = "default_commit_template")]
    pub commit_message_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

fn default_commit_template() -> String {
    "orchestra: {task}".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            auto_commit: false,
            commit_message_template: default_commit_template(),
            branch: None,
        }
    }
}

/// Per-role prompt prefixes, prepended to the base prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultant: Option<String>,
}

/// Recovery-branch knobs. The section keeps its historical `tui` name in
/// the JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryConfig {
    #[serde(default = "default_recovery_attempts")]
    pub max_recovery_attempts: u32,
    #[serde(default = "default_recovery_timeout_minutes")]
    pub recovery_timeout_minutes: u64,
    #[serde(default = "default_auto_revert")]
    pub auto_revert_on_failure: bool,
}

fn default_recovery_attempts() -> u32 {
    2
}

fn default_recovery_timeout_minutes() -> u64 {
    10
}

fn default_auto_revert() -> bool {
    true
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: default_recovery_attempts(),
            recovery_timeout_minutes: default_recovery_timeout_minutes(),
            auto_revert_on_failure: default_auto_revert(),
        }
    }
}

/// Ordered backend identifiers per role, defining each role's fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentChains {
    #[serde(default = "default_chain")]
    pub architect: Vec<String>,
    #[serde(default = "default_chain")]
    pub executor: Vec<String>,
    #[serde(default = "default_chain")]
    pub auditor: Vec<String>,
    #[serde(default = "default_chain")]
    pub consultant: Vec<String>,
}

fn default_chain() -> Vec<String> {
    vec![
        "claude".to_string(),
        "codex".to_string(),
        "gemini".to_string(),
        "qwen".to_string(),
    ]
}

impl Default for AgentChains {
    fn default() -> Self {
        Self {
            architect: default_chain(),
            executor: default_chain(),
            auditor: default_chain(),
            consultant: default_chain(),
        }
    }
}

impl AgentChains {
    pub fn for_role(&self, role: crate::role::AgentRole) -> &[String] {
        use crate::role::AgentRole::*;
        match role {
            Architect => &self.architect,
            Executor => &self.executor,
            Auditor => &self.auditor,
            Consultant => &self.consultant,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Reuse the approved plan on a watch-mode rerun when it still parses.
    #[serde(default = "default_reuse_plan")]
    pub reuse_plan: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_reuse_plan() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reuse_plan: default_reuse_plan(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub prompts: PromptOverrides,
    #[serde(rename = "tui", default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub agents: AgentChains,
    #[serde(default)]
    pub watch: WatchConfig,
    /// Extra or overriding backend definitions; merged over the builtin
    /// registry by id.
    #[serde(default)]
    pub backends: Vec<BackendEntry>,
}

fn default_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            test: TestConfig::default(),
            git: GitConfig::default(),
            languages: default_languages(),
            prompts: PromptOverrides::default(),
            recovery: RecoveryConfig::default(),
            agents: AgentChains::default(),
            watch: WatchConfig::default(),
            backends: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `orchestra.json` from the project root, or defaults if absent.
    /// Returns the path actually read, when one was.
    pub fn load_or_default(project_root: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if path.exists() {
            let config = Self::load(&path)?;
            Ok((config, Some(path)))
        } else {
            Ok((Config::default(), None))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.max_concurrency < 1 {
            return Err(ConfigError::Invalid(
                "execution.maxConcurrency must be >= 1".into(),
            ));
        }
        if self.execution.max_iterations < 1 {
            return Err(ConfigError::Invalid(
                "execution.maxIterations must be >= 1".into(),
            ));
        }
        for role in crate::role::AgentRole::ALL {
            if self.agents.for_role(role).is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "agents.{role} must name at least one backend"
                )));
            }
        }
        Ok(())
    }

    /// Default document written by `orchestra init`.
    pub fn default_json() -> String {
        let config = Config::default();
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
