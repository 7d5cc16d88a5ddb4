//! CLI interface for analyst
//!
//! This module provides the command-line interface using clap's derive API.
//! Without a subcommand the interactive session starts.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tiered-memory multi-agent data analyst
///
/// Builds a project context for your dataset, then routes each request
/// through cleaning, feature engineering, visualization and training agents
/// with a reviewer in the loop.
#[derive(Parser, Debug)]
#[command(name = "analyst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the interactive session (default)
    Run,

    /// Print the workflow graph
    Graph,

    /// Inspect or reset memory tiers
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Store a provider API key in the OS keychain
    Key {
        /// Provider name (groq, openrouter, cerebras, gemini)
        provider: String,
    },
}

/// Memory management actions
#[derive(Subcommand, Debug)]
pub enum MemoryAction {
    /// Dump every Warm session as JSON
    Dump {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Clear one tier or all of them
    Clear {
        #[arg(long, value_enum, default_value_t = Tier::All)]
        tier: Tier,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
    All,
}

impl Cli {
    /// The subcommand, defaulting to the interactive session
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_run() {
        let cli = Cli::parse_from(["analyst"]);
        assert!(matches!(cli.command(), Command::Run));
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["analyst", "graph", "--log", "debug", "--config", "a.toml"]);
        assert!(matches!(cli.command(), Command::Graph));
        assert_eq!(cli.log, Some("debug".to_string()));
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
    }

    #[test]
    fn test_memory_dump_output() {
        let cli = Cli::parse_from(["analyst", "memory", "dump", "--output", "warm.json"]);
        if let Some(Command::Memory {
            action: MemoryAction::Dump { output },
        }) = cli.command
        {
            assert_eq!(output, Some(PathBuf::from("warm.json")));
        } else {
            panic!("Expected memory dump");
        }
    }

    #[test]
    fn test_memory_clear_tier() {
        let cli = Cli::parse_from(["analyst", "memory", "clear", "--tier", "cold"]);
        assert!(matches!(
            cli.command,
            Some(Command::Memory {
                action: MemoryAction::Clear { tier: Tier::Cold }
            })
        ));

        let cli = Cli::parse_from(["analyst", "memory", "clear"]);
        assert!(matches!(
            cli.command,
            Some(Command::Memory {
                action: MemoryAction::Clear { tier: Tier::All }
            })
        ));
    }

    #[test]
    fn test_key_command() {
        let cli = Cli::parse_from(["analyst", "key", "groq"]);
        if let Some(Command::Key { provider }) = cli.command {
            assert_eq!(provider, "groq");
        } else {
            panic!("Expected Key command");
        }
    }
}
