//! Configuration loading, validation, and management for planloop.
//!
//! Loads configuration from `~/.planloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use planloop_core::tool::DEFAULT_SOFT_FAILURE_MARKERS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.planloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default oracle provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per oracle response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Control-loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Timeout and retry policy for oracle calls
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Capability settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "qwen3:8b".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("oracle", &self.oracle)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Plan/execute/reflect/decide loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Failed step executions tolerated before the circuit breaker trips
    #[serde(default = "default_error_budget")]
    pub max_error_budget: u32,

    /// Minimum reflection confidence to keep following the plan
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Hard ceiling on executor iterations per session
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Oracle attempts (including corrective retries) per plan request
    #[serde(default = "default_planner_attempts")]
    pub planner_max_attempts: u32,

    #[serde(default = "default_reflector_attempts")]
    pub reflector_max_attempts: u32,

    /// Prior results longer than this are truncated in planner prompts
    #[serde(default = "default_history_result_chars")]
    pub history_result_chars: usize,

    /// Allow one corrected retry of a step instead of a full replan
    #[serde(default)]
    pub allow_retry: bool,

    /// Classify the goal before planning
    #[serde(default)]
    pub route_intents: bool,
}

fn default_error_budget() -> u32 {
    3
}
fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_max_iterations() -> u32 {
    10
}
fn default_planner_attempts() -> u32 {
    3
}
fn default_reflector_attempts() -> u32 {
    1
}
fn default_history_result_chars() -> usize {
    200
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_error_budget: default_error_budget(),
            confidence_threshold: default_confidence_threshold(),
            max_iterations: default_max_iterations(),
            planner_max_attempts: default_planner_attempts(),
            reflector_max_attempts: default_reflector_attempts(),
            history_result_chars: default_history_result_chars(),
            allow_retry: false,
            route_intents: false,
        }
    }
}

/// Per-call timeout and retry policy for the reasoning oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_oracle_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles on every further attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_timeout_secs() -> u64 {
    120
}
fn default_oracle_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    2000
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_oracle_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// JSON record catalog used by `record_finder`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Case-insensitive markers that turn a returned string into a failure
    #[serde(default = "default_soft_failure_markers")]
    pub soft_failure_markers: Vec<String>,
}

fn default_soft_failure_markers() -> Vec<String> {
    DEFAULT_SOFT_FAILURE_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            timeout_secs: default_timeout_secs(),
            soft_failure_markers: default_soft_failure_markers(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.planloop/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `PLANLOOP_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("PLANLOOP_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("PLANLOOP_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("PLANLOOP_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".planloop")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.agent.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "agent.confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        let at_least_one = [
            ("agent.max_error_budget", self.agent.max_error_budget),
            ("agent.max_iterations", self.agent.max_iterations),
            ("agent.planner_max_attempts", self.agent.planner_max_attempts),
            ("agent.reflector_max_attempts", self.agent.reflector_max_attempts),
            ("oracle.max_attempts", self.oracle.max_attempts),
        ];
        if let Some((name, _)) = at_least_one.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be at least 1")));
        }

        if self.oracle.timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            oracle: OracleConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.agent.max_error_budget, 3);
        assert_eq!(config.agent.max_iterations, 10);
        assert!((config.agent.confidence_threshold - 0.6).abs() < f64::EPSILON);
        assert!(!config.agent.allow_retry);
        assert_eq!(config.oracle.timeout_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.planner_max_attempts, 3);
        assert_eq!(parsed.tools.soft_failure_markers, config.tools.soft_failure_markers);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
default_model = "gpt-4o-mini"

[agent]
max_error_budget = 5
allow_retry = true

[tools]
catalog_path = "/data/papers.json"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.agent.max_error_budget, 5);
        assert!(config.agent.allow_retry);
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.tools.timeout_secs, 120);
        assert_eq!(
            config.tools.catalog_path.as_deref(),
            Some(Path::new("/data/papers.json"))
        );
        assert!(!config.tools.soft_failure_markers.is_empty());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 3.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_agent_settings_rejected() {
        let mut config = AppConfig::default();
        config.agent.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("agent.max_iterations"));

        let mut config = AppConfig::default();
        config.oracle.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/planloop.toml")).unwrap();
        assert_eq!(config.default_provider, "ollama");
    }

    #[test]
    fn load_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nconfidence_threshold = 2.0").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn load_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_follow_priority() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "OPENROUTER_API_KEY" => Some("or-key".into()),
            "OPENAI_API_KEY" => Some("oa-key".into()),
            "PLANLOOP_MODEL" => Some("llama3".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.default_model, "llama3");
        assert_eq!(config.default_provider, "ollama");
    }

    #[test]
    fn configured_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|_| Some("from-env".into()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.default_provider, "from-env");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                api_url: None,
                default_model: None,
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("sk-other"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("default_provider"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("[oracle]"));
    }
}
