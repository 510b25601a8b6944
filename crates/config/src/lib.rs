//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::context::DEFAULT_MAX_HISTORY;
use parley_core::message::DEFAULT_DISPLAY_NAME;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Value shipped in sample `.env` files; treated as "no key configured".
pub const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation backend settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation memory and prompt settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Dispatcher filtering
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Backend failure classification markers
    #[serde(default)]
    pub failures: FailureMarkersConfig,

    /// HTTP status server
    #[serde(default)]
    pub server: ServerConfig,

    /// Channel configurations
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
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
            .field("provider", &self.provider)
            .field("conversation", &self.conversation)
            .field("dispatch", &self.dispatch)
            .field("failures", &self.failures)
            .field("server", &self.server)
            .field("channels", &self.channels)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "gemini" or the name of an OpenAI-compatible backend
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Override the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Upper bound on a single generation call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.8
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            model: default_model(),
            api_url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Turns retained per conversation
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Turns included in each prompt
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Replace the built-in assistant persona
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    /// Label for users whose name the transport cannot provide
    #[serde(default = "default_display_name")]
    pub default_display_name: String,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}
fn default_context_window() -> usize {
    5
}
fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.into()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            context_window: default_context_window(),
            persona: None,
            default_display_name: default_display_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Chat ids whose messages are dropped without a reply
    #[serde(default = "default_ignored_senders")]
    pub ignored_senders: Vec<String>,
}

fn default_ignored_senders() -> Vec<String> {
    vec!["status@broadcast".into()]
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            ignored_senders: default_ignored_senders(),
        }
    }
}

/// Substrings that identify each failure kind in backend error text.
///
/// These track the backend's error wording and may need updating when the
/// backend changes its messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMarkersConfig {
    #[serde(default = "default_credential_markers")]
    pub credential_markers: Vec<String>,

    #[serde(default = "default_quota_markers")]
    pub quota_markers: Vec<String>,

    #[serde(default = "default_safety_markers")]
    pub safety_markers: Vec<String>,
}

fn default_credential_markers() -> Vec<String> {
    vec!["API_KEY".into()]
}
fn default_quota_markers() -> Vec<String> {
    vec!["QUOTA_EXCEEDED".into()]
}
fn default_safety_markers() -> Vec<String> {
    vec!["SAFETY".into()]
}

impl Default for FailureMarkersConfig {
    fn default() -> Self {
        Self {
            credential_markers: default_credential_markers(),
            quota_markers: default_quota_markers(),
            safety_markers: default_safety_markers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    /// When omitted the channel picks its own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_users: Option<Vec<String>>,

    /// Channel-specific settings (varies by platform)
    #[serde(flatten)]
    pub settings: HashMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PARLEY_API_KEY`, then `GEMINI_API_KEY`
    /// - `PARLEY_PROVIDER`, `PARLEY_MODEL`
    /// - `PORT` (status server port)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
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

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.api_key = sanitize_key(config.api_key.take());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = sanitize_key(lookup("PARLEY_API_KEY"))
                .or_else(|| sanitize_key(lookup("GEMINI_API_KEY")));
        }

        if let Some(provider) = lookup("PARLEY_PROVIDER") {
            self.provider.name = provider;
        }

        if let Some(model) = lookup("PARLEY_MODEL") {
            self.provider.model = model;
        }

        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_secs must be at least 1".into(),
            ));
        }

        if self.conversation.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.max_history must be at least 1".into(),
            ));
        }

        if self.conversation.context_window == 0
            || self.conversation.context_window > self.conversation.max_history
        {
            return Err(ConfigError::ValidationError(
                "conversation.context_window must be between 1 and max_history".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            conversation: ConversationConfig::default(),
            dispatch: DispatchConfig::default(),
            failures: FailureMarkersConfig::default(),
            server: ServerConfig::default(),
            channels: HashMap::new(),
        }
    }
}

/// Drop empty and placeholder keys.
fn sanitize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
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
