//! Analyst SDK
//!
//! Shared library providing the error type and tool traits used by the
//! analyst engine and by any externally packaged tools.

/// Tool trait and tool descriptions
pub mod tool;

/// Error types and handling
pub mod errors;

/// Tool input types
pub mod types;

pub use errors::{AnalystErrorExt, EngineError};
pub use tool::{Tool, ToolSpec};
pub use types::{ToolError, ToolInput};
