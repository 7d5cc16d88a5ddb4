//! Analyst Engine Library
//!
//! This library provides the core functionality of the analyst engine.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Hot, Warm and Cold memory tiers
pub mod memory;

/// Worker tools
pub mod tools;

/// Specialist workers
pub mod agent;

/// Workflow orchestration module
pub mod conductor;

/// Project context building
pub mod context;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
