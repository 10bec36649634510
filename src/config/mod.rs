//! Configuration system (layered: defaults < TOML file < environment < code).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TurnstileError};
use crate::types::GenerationSettings;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Top-level configuration.
///
/// ```
/// use turnstile::config::TurnstileConfig;
///
/// let config = TurnstileConfig::from_toml_str(r#"
///     [provider]
///     model = "claude-opus-4-20250514"
///
///     [approval]
///     allow_edit = false
/// "#).unwrap();
/// assert_eq!(config.provider.model, "claude-opus-4-20250514");
/// assert!(!config.approval.allow_edit);
/// assert_eq!(config.agent.max_iterations, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TurnstileConfig {
    pub provider: ProviderConfig,
    pub generation: GenerationSettings,
    pub agent: AgentConfig,
    pub approval: ApprovalConfig,
}

/// Model provider connection settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Conversation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on generate steps per `run`/`resume`.
    pub max_iterations: usize,
    /// Dispatch independent, non-gated tool calls concurrently.
    pub parallel_tool_calls: bool,
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            parallel_tool_calls: true,
            system_prompt: None,
        }
    }
}

/// Approval gate settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Offer `edit` alongside `approve`/`reject`.
    pub allow_edit: bool,
    /// Name fragments identifying a windowing/browser resource.
    pub resource_keywords: Vec<String>,
    /// Name fragments identifying a destructive action.
    pub action_keywords: Vec<String>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            allow_edit: true,
            resource_keywords: vec!["window".into(), "browser".into()],
            action_keywords: vec!["delete".into(), "remove".into()],
        }
    }
}

impl TurnstileConfig {
    /// Parse a TOML document; missing sections keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| TurnstileError::Configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML file, then overlay environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from_toml_str(&raw)?.apply_env())
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Overlay environment variables (`.env` is loaded if present).
    pub fn apply_env(self) -> Self {
        let _ = dotenvy::dotenv();
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(model) = lookup("TURNSTILE_MODEL") {
            self.provider.model = model;
        }
        if let Some(max) = lookup("TURNSTILE_MAX_ITERATIONS").and_then(|v| v.parse().ok()) {
            self.agent.max_iterations = max;
        }
        self
    }

    /// Set the API key explicitly (highest precedence).
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.provider.api_key = Some(key.into());
        self
    }
}
