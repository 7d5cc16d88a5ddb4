//! Specialist workers.
//!
//! Every worker is the same [`Worker`] loop; a [`WorkerRole`] fixes its name,
//! prompt template and tool set.

pub mod prompts;
pub mod worker;

pub use worker::{Worker, WorkerSettings};

/// Tools every expert gets
pub const EXPERT_TOOLS: &[&str] = &["python_interpreter", "install_package", "chat_log_search"];

/// The Watcher reviews and may re-check results but never installs packages
pub const WATCHER_TOOLS: &[&str] = &["python_interpreter", "chat_log_search"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Cleaner,
    FeatureEngineer,
    Visualizer,
    Trainer,
    Watcher,
}

impl WorkerRole {
    pub const ALL: [WorkerRole; 5] = [
        WorkerRole::Cleaner,
        WorkerRole::FeatureEngineer,
        WorkerRole::Visualizer,
        WorkerRole::Trainer,
        WorkerRole::Watcher,
    ];

    /// Label used in Warm memory and logs
    pub fn name(&self) -> &'static str {
        match self {
            WorkerRole::Cleaner => "Cleaner",
            WorkerRole::FeatureEngineer => "Feature_Engineer",
            WorkerRole::Visualizer => "Visualizer",
            WorkerRole::Trainer => "Trainer",
            WorkerRole::Watcher => "Watcher",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            WorkerRole::Cleaner => prompts::CLEANER,
            WorkerRole::FeatureEngineer => prompts::FEATURE_ENGINEER,
            WorkerRole::Visualizer => prompts::VISUALIZER,
            WorkerRole::Trainer => prompts::TRAINER,
            WorkerRole::Watcher => prompts::WATCHER,
        }
    }

    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            WorkerRole::Watcher => WATCHER_TOOLS,
            _ => EXPERT_TOOLS,
        }
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
