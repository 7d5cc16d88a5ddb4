//! Configuration management
//!
//! This module handles loading, validation, and management of the analyst configuration.
//! Configuration is stored in TOML format at ~/.analyst/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory and log level
//! - **llm**: Active provider, fallback order and per-provider endpoints
//! - **memory**: Hot/Warm/Cold tier locations and window sizes
//! - **workflow**: Worker tool-round limit and orchestration bounds
//! - **tools**: Python interpreter used by the code-execution tools
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! # Examples
//!
//! ```no_run
//! use analyst_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Providers the engine knows how to construct
pub const KNOWN_PROVIDERS: &[&str] = &["gemini", "groq", "openrouter", "cerebras"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Memory tier configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Orchestration limits
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Tool execution settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider active at startup (gemini, groq, openrouter, cerebras)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model override for the startup provider; the provider's own model when unset
    #[serde(default)]
    pub default_model: Option<String>,

    /// Providers tried in order after the active provider fails
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<String>,

    /// Timeout for a single provider request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Groq provider settings
    #[serde(default = "default_groq")]
    pub groq: ProviderConfig,

    /// OpenRouter provider settings
    #[serde(default = "default_openrouter")]
    pub openrouter: ProviderConfig,

    /// Cerebras provider settings
    #[serde(default = "default_cerebras")]
    pub cerebras: ProviderConfig,

    /// Gemini provider settings
    #[serde(default = "default_gemini")]
    pub gemini: ProviderConfig,
}

/// Endpoint settings shared by every HTTP provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    pub base_url: String,

    /// Model name used when switching to this provider without an explicit model
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,
    // Note: the key may also live in the OS keychain under the lowercased env name
}

/// Memory tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Messages kept per Warm session before the oldest spill to the archive
    #[serde(default = "default_warm_capacity")]
    pub warm_capacity: usize,

    /// Messages popped per overflow
    #[serde(default = "default_archive_batch_size")]
    pub archive_batch_size: usize,

    /// Messages replayed into each worker prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Per-message character cap inside a worker prompt
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Connection URL for the live Warm backend; file backend is used when unset or unreachable
    #[serde(default)]
    pub warm_database_url: Option<String>,

    /// Seconds allowed for the Warm backend reachability probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Hot tier file, relative to the data directory unless absolute
    #[serde(default = "default_hot_file")]
    pub hot_file: PathBuf,

    /// Warm tier fallback file, relative to the data directory unless absolute
    #[serde(default = "default_warm_file")]
    pub warm_file: PathBuf,

    /// Cold tier database, relative to the data directory unless absolute
    #[serde(default = "default_cold_db")]
    pub cold_db: PathBuf,
}

/// Orchestration and worker limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Tool-call rounds a worker may run for one task
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// FAIL verdicts that may send a request back to the Router
    #[serde(default = "default_max_replans")]
    pub max_replans: usize,

    /// Node executions allowed for one request
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Warm session shared by every specialist worker
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

/// Tool execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Python interpreter used by python_interpreter and install_package
    #[serde(default = "default_python")]
    pub python: String,

    /// Working directory for executed code (supports ~ expansion)
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Timeout for a single tool execution
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Ask on the terminal before install_package runs pip
    #[serde(default = "default_true")]
    pub confirm_installs: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.analyst")
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_fallback_order() -> Vec<String> {
    vec![
        "gemini".to_string(),
        "groq".to_string(),
        "openrouter".to_string(),
    ]
}

fn default_request_timeout() -> u64 {
    120
}

fn default_groq() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://api.groq.com/openai/v1".to_string(),
        model: "qwen/qwen3-32b".to_string(),
        api_key_env: "GROQ_API_KEY".to_string(),
    }
}

fn default_openrouter() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://openrouter.ai/api/v1".to_string(),
        model: "meta-llama/llama-3.3-70b-instruct".to_string(),
        api_key_env: "OPENROUTER_API_KEY".to_string(),
    }
}

fn default_cerebras() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://api.cerebras.ai/v1".to_string(),
        model: "qwen-3-32b".to_string(),
        api_key_env: "CEREBRAS_API_KEY".to_string(),
    }
}

fn default_gemini() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        model: "gemini-2.5-flash".to_string(),
        api_key_env: "GEMINI_API_KEY".to_string(),
    }
}

fn default_warm_capacity() -> usize {
    10
}

fn default_archive_batch_size() -> usize {
    1
}

fn default_history_limit() -> usize {
    30
}

fn default_max_message_chars() -> usize {
    3000
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_hot_file() -> PathBuf {
    PathBuf::from("hot_memory.json")
}

fn default_warm_file() -> PathBuf {
    PathBuf::from("warm_memory_dump.json")
}

fn default_cold_db() -> PathBuf {
    PathBuf::from("cold_memory.db")
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_max_replans() -> usize {
    3
}

fn default_max_steps() -> usize {
    25
}

fn default_session_id() -> String {
    "shared_session_v1".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_tool_timeout() -> u64 {
    60
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: None,
            fallback_order: default_fallback_order(),
            request_timeout_secs: default_request_timeout(),
            groq: default_groq(),
            openrouter: default_openrouter(),
            cerebras: default_cerebras(),
            gemini: default_gemini(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warm_capacity: default_warm_capacity(),
            archive_batch_size: default_archive_batch_size(),
            history_limit: default_history_limit(),
            max_message_chars: default_max_message_chars(),
            warm_database_url: None,
            probe_timeout_secs: default_probe_timeout(),
            hot_file: default_hot_file(),
            warm_file: default_warm_file(),
            cold_db: default_cold_db(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_replans: default_max_replans(),
            max_steps: default_max_steps(),
            session_id: default_session_id(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            work_dir: default_work_dir(),
            timeout_secs: default_tool_timeout(),
            confirm_installs: default_true(),
        }
    }
}

impl LLMConfig {
    /// Endpoint settings for a provider name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "groq" => Some(&self.groq),
            "openrouter" => Some(&self.openrouter),
            "cerebras" => Some(&self.cerebras),
            "gemini" => Some(&self.gemini),
            _ => None,
        }
    }
}

impl MemoryConfig {
    /// Hot tier file resolved against the data directory
    pub fn hot_path(&self, data_dir: &Path) -> PathBuf {
        resolve_in(data_dir, &self.hot_file)
    }

    /// Warm fallback file resolved against the data directory
    pub fn warm_path(&self, data_dir: &Path) -> PathBuf {
        resolve_in(data_dir, &self.warm_file)
    }

    /// Cold database resolved against the data directory
    pub fn cold_path(&self, data_dir: &Path) -> PathBuf {
        resolve_in(data_dir, &self.cold_db)
    }
}

fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl Config {
    /// Load configuration from the default location (~/.analyst/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let template = Config::default();
        let toml_string = toml::to_string_pretty(&template)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = template;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.analyst/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".analyst").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// This method validates names and limits, expands ~ in paths and
    /// creates the data directory if it doesn't exist.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !KNOWN_PROVIDERS.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if let Some(unknown) = self
            .llm
            .fallback_order
            .iter()
            .find(|p| !KNOWN_PROVIDERS.contains(&p.as_str()))
        {
            return Err(EngineError::Config(format!(
                "Invalid fallback provider '{}'. Must be one of: {}",
                unknown,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.memory.warm_capacity == 0 {
            return Err(EngineError::Config(
                "warm_capacity must be at least 1".to_string(),
            ));
        }
        if self.memory.archive_batch_size == 0 {
            return Err(EngineError::Config(
                "archive_batch_size must be at least 1".to_string(),
            ));
        }
        if self.workflow.max_steps == 0 {
            return Err(EngineError::Config("max_steps must be at least 1".to_string()));
        }
        if self.workflow.session_id.trim().is_empty() {
            return Err(EngineError::Config("session_id must not be empty".to_string()));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.tools.work_dir = expand_path(&self.tools.work_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
