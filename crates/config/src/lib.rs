//! Configuration loading, validation, and management for Loopwright.
//!
//! Loads configuration from `~/.loopwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use loopwright_core::llm::ToolChoice;
use loopwright_core::session::AgentDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.loopwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model name sent with every completion request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Remote tool sources to connect at startup
    #[serde(default)]
    pub tool_sources: Vec<ToolSourceConfig>,

    /// Session store settings
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("tool_sources", &self.tool_sources)
            .field("store", &self.store)
            .finish()
    }
}

/// Agent loop settings. New sessions snapshot these into an [`AgentDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_type")]
    pub agent_type: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,

    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Consecutive empty responses before the run stops
    #[serde(default = "default_threshold")]
    pub empty_threshold: u32,

    /// Consecutive repeated responses before the run stops
    #[serde(default = "default_threshold")]
    pub duplicate_threshold: u32,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Re-discover remote tools every N steps (0 = never)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_steps: u32,

    /// Expose the knowledge-base retrieval tool
    #[serde(default)]
    pub knowledge_enabled: bool,

    /// Remote sources new sessions may use (empty = all)
    #[serde(default)]
    pub enabled_sources: Vec<String>,

    /// Tool observations longer than this are truncated
    #[serde(default = "default_max_observation_chars")]
    pub max_observation_chars: usize,
}

fn default_agent_type() -> String {
    "react".into()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant that solves tasks step by step, using tools when they help."
        .into()
}
fn default_max_steps() -> u32 {
    10
}
fn default_threshold() -> u32 {
    2
}
fn default_refresh_interval() -> u32 {
    5
}
fn default_max_observation_chars() -> usize {
    8000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_type: default_agent_type(),
            system_prompt: default_system_prompt(),
            next_step_prompt: None,
            max_steps: default_max_steps(),
            empty_threshold: default_threshold(),
            duplicate_threshold: default_threshold(),
            tool_choice: ToolChoice::Auto,
            refresh_interval_steps: default_refresh_interval(),
            knowledge_enabled: false,
            enabled_sources: vec![],
            max_observation_chars: default_max_observation_chars(),
        }
    }
}

impl AgentConfig {
    /// Snapshot these settings for a new session.
    pub fn to_definition(&self) -> AgentDefinition {
        AgentDefinition {
            agent_type: self.agent_type.clone(),
            system_prompt: self.system_prompt.clone(),
            next_step_prompt: self.next_step_prompt.clone(),
            max_steps: self.max_steps,
            duplicate_threshold: self.duplicate_threshold,
            tool_choice: self.tool_choice,
            enabled_sources: self.enabled_sources.clone(),
        }
    }
}

/// A remote tool source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSourceConfig {
    /// Source id; becomes the namespace prefix of its tools
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(flatten)]
    pub transport: TransportConfig,
}

/// How to reach a remote tool source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Spawn a subprocess and speak JSON-RPC over its stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// POST JSON-RPC to a long-lived server
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (ignored for the in-memory backend)
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    AppConfig::config_dir()
        .join("sessions.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.loopwright/config.toml).
    ///
    /// Environment overrides:
    /// - `LOOPWRIGHT_API_KEY`, then `OPENAI_API_KEY` (when no key is configured)
    /// - `LOOPWRIGHT_MODEL`
    /// - `LOOPWRIGHT_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply the environment overrides listed on [`AppConfig::load`].
    pub fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("LOOPWRIGHT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(model) = std::env::var("LOOPWRIGHT_MODEL") {
            self.model = model;
        }
        if let Ok(url) = std::env::var("LOOPWRIGHT_API_URL") {
            self.api_url = url;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loopwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.agent.empty_threshold == 0 || self.agent.duplicate_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "agent.empty_threshold and agent.duplicate_threshold must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.tool_sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "tool source id must be non-empty".into(),
                ));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate tool source id: {}",
                    source.id
                )));
            }
            match &source.transport {
                TransportConfig::Stdio { command, .. } if command.trim().is_empty() => {
                    return Err(ConfigError::ValidationError(format!(
                        "tool source {} has an empty command",
                        source.id
                    )));
                }
                TransportConfig::Http { url, .. } if url.trim().is_empty() => {
                    return Err(ConfigError::ValidationError(format!(
                        "tool source {} has an empty url",
                        source.id
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Enabled tool sources only.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &ToolSourceConfig> {
        self.tool_sources.iter().filter(|s| s.enabled)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render the effective config as TOML with the API key removed.
    pub fn redacted_toml(&self) -> String {
        let mut shown = self.clone();
        shown.api_key = None;
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            tool_sources: vec![],
            store: StoreConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
