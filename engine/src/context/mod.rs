//! Project context building.

pub mod contextor;
pub mod profiler;
pub mod prompter;

pub use contextor::Contextor;
pub use profiler::{classify_source, Profiler, PythonProfiler, SourceKind};
pub use prompter::{Prompter, ScriptedPrompter, TerminalPrompter};
