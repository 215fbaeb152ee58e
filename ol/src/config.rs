//! Optloop configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::{DEFAULT_KIND_FIELD, ExtractionStrategy};

/// Main Optloop configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Driving loop settings
    pub optimiser: OptimiserConfig,

    /// Evaluation command settings
    pub eval: EvalConfig,

    /// Shell execution limits
    pub shell: ShellConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the LLM API key environment variable is set. Call this
    /// early in startup to fail fast with a clear error message.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .optloop.yml
        let local_config = PathBuf::from(".optloop.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/optloop/optloop.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("optloop").join("optloop.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is initialised
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Attempts per request while the provider reports overload
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds, doubled on every retry
    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
            max_retries: 10,
            retry_base_delay_ms: 1000,
            temperature: Some(0.7),
        }
    }
}

/// Driving loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimiserConfig {
    /// Attempts per eval for the baseline run
    #[serde(rename = "initial-attempts")]
    pub initial_attempts: u32,

    /// Stop after this many completed iterations
    #[serde(rename = "max-iterations")]
    pub max_iterations: Option<u32>,

    /// Turn limit for a trajectory analysis subagent
    #[serde(rename = "subagent-max-turns")]
    pub subagent_max_turns: u32,

    /// Field naming the command kind in JSON payloads
    #[serde(rename = "action-field")]
    pub action_field: String,

    /// How commands are embedded in generated text
    pub extraction: ExtractionStrategy,
}

impl Default for OptimiserConfig {
    fn default() -> Self {
        Self {
            initial_attempts: 3,
            max_iterations: None,
            subagent_max_turns: 20,
            action_field: DEFAULT_KIND_FIELD.to_string(),
            extraction: ExtractionStrategy::Json,
        }
    }
}

/// Evaluation command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Timeout for one suite run in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { timeout_secs: 3600 }
    }
}

/// Shell execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Upper bound applied to any requested timeout
    #[serde(rename = "max-timeout-secs")]
    pub max_timeout_secs: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self { max_timeout_secs: 300 }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per run
    #[serde(rename = "runs-dir")]
    pub runs_dir: String,
}

impl StorageConfig {
    /// Runs directory with `~` expanded
    pub fn expanded_runs_dir(&self) -> PathBuf {
        match self.runs_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|h| h.join(rest)).unwrap_or_else(|| PathBuf::from(&self.runs_dir)),
            None => PathBuf::from(&self.runs_dir),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let runs_dir = dirs::data_local_dir()
            .map(|d| d.join("optloop").join("runs").to_string_lossy().into_owned())
            .unwrap_or_else(|| ".optloop/runs".to_string());
        Self { runs_dir }
    }
}
