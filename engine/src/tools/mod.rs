//! Worker tools and the registry that dispatches them.

pub mod install;
pub mod python;
pub mod search;

pub use install::{AutoApprove, InstallApproval, InstallPackageTool, TerminalApproval};
pub use python::PythonInterpreterTool;
pub use search::ChatLogSearchTool;

use sdk::tool::{Tool, ToolSpec};
use sdk::types::ToolInput;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name-keyed set of tools bound to one worker.
///
/// Lookup is exact first, then case-insensitive. Registration order is kept
/// for the specs advertised to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// The registry restricted to `names`, in that order
    pub fn subset(&self, names: &[&str]) -> Self {
        let mut subset = Self::new();
        for name in names {
            if let Some(tool) = self.get(name) {
                subset.register(Arc::clone(tool));
            }
        }
        subset
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name).or_else(|| {
            self.tools
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, tool)| tool)
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool call and return its observation.
    ///
    /// Failures come back as text so the model can see them and self-correct.
    pub async fn dispatch(&self, name: &str, arguments_json: &str) -> String {
        debug!("Dispatching tool '{}' with args: {}", name, arguments_json);

        let Some(tool) = self.get(name) else {
            warn!("Unknown tool requested: {}", name);
            return format!("Error: Tool {} not found.", name);
        };

        let input = match ToolInput::from_json(arguments_json, tool.primary_param()) {
            Ok(input) => input,
            Err(e) => return format!("Error executing tool: {}", e),
        };

        match tool.invoke(input).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool {} failed: {}", tool.name(), e);
                format!("Error executing tool: {}", e)
            }
        }
    }
}
