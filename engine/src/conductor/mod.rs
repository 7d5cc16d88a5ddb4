//! Conductor System
//!
//! Drives one request through the Router, expert and Watcher nodes.

pub mod evaluator;
pub mod graph;
pub mod interrupt;
pub mod orchestrator;
pub mod planner;
pub mod state;

pub use evaluator::{Evaluator, Verdict};
pub use graph::render_graph;
pub use interrupt::InterruptHandle;
pub use orchestrator::{Crew, Orchestrator, WorkflowLimits, WorkflowOutcome, INTERRUPTED_TEXT};
pub use planner::{Planner, RouterDecision};
pub use state::{Node, TaskPlan, Transcript, WatcherStatus, WorkflowState};
