//! Error types and handling
//!
//! This module provides the error types used throughout the analyst engine.
//! All errors implement the `AnalystErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry raw API keys. Provider errors are passed through
//! the engine's secret scrubber before they are wrapped here.

use thiserror::Error;

/// Trait for analyst error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait AnalystErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors leave the interactive session usable. The only
    /// non-recoverable condition for a task is running out of LLM providers.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database / Memory**: SQLite and memory-tier backend failures
/// - **LLM Provider**: API failures, unknown provider names, exhausted fallback
/// - **Tools**: Lookup and execution failures
/// - **Context**: Profiler failures during context building
///
/// # Examples
///
/// ```
/// use sdk::errors::{AnalystErrorExt, EngineError};
///
/// let error = EngineError::ToolNotFound("plotter".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::AllProvidersExhausted;
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(std::path::PathBuf, String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Memory tier errors
    #[error("Memory backend error: {0}")]
    Memory(String),

    #[error("Archive error: {0}")]
    Archive(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    // LLM routing errors
    #[error("All LLM providers exhausted")]
    AllProvidersExhausted,

    #[error("LLM call timed out")]
    LLMTimeout,

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    // Context building errors
    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("Profiler error: {0}")]
    Profiler(String),

    // Session errors
    #[error("Interrupted by user")]
    Interrupted,

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalystErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            Self::Database(_) => "Database operation failed. Check the data directory",
            Self::Memory(_) => "Session memory is unavailable. Recent history may be incomplete",
            Self::Archive(_) => "Long-term archive write failed. Recent memory is unaffected",

            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",
            Self::UnknownProvider(_) => "Unknown provider. Use gemini, groq, openrouter or cerebras",
            Self::AllProvidersExhausted => "No LLM providers available. Check API keys and quotas",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",

            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",
            Self::InvalidArguments(_) => "Tool was called with malformed arguments",

            Self::UnknownSourceType(_) => {
                "Provide a file path, folder, URL or database connection string"
            }
            Self::Profiler(_) => "Could not read the dataset. Check the path and format",

            Self::Interrupted => "Task interrupted. You are back at the prompt",

            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::AllProvidersExhausted | Self::UnknownSourceType(_)
        )
    }
}
