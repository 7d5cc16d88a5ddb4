//! Tool trait
//!
//! Every capability a worker can call (code execution, package installation,
//! archive search) implements [`Tool`]. The engine keeps tools in a name-keyed
//! registry and advertises them to the model through [`ToolSpec`].

use crate::errors::EngineError;
use crate::types::ToolInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait that all worker tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the name the model uses to call this tool
    fn name(&self) -> &str;

    /// Returns a one-paragraph description shown to the model
    fn description(&self) -> &str;

    /// Returns the JSON schema of the tool's arguments object
    fn parameters(&self) -> serde_json::Value;

    /// Name of the argument a bare string argument is bound to
    fn primary_param(&self) -> &str;

    /// Execute the tool and return its textual observation
    async fn invoke(&self, input: ToolInput) -> Result<String, EngineError>;

    /// Describe this tool for function-calling APIs
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Description of a tool as advertised to an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        fn primary_param(&self) -> &str {
            "text"
        }

        async fn invoke(&self, input: ToolInput) -> Result<String, EngineError> {
            input
                .param_str("text")
                .map_err(|e| EngineError::InvalidArguments(e.to_string()))
        }
    }

    #[test]
    fn test_spec_mirrors_tool() {
        let spec = Echo.spec();
        assert_eq!(spec.name, "echo");
        assert_eq!(spec.parameters["properties"]["text"]["type"], "string");
    }

    #[tokio::test]
    async fn test_invoke_reports_missing_argument() {
        let err = Echo.invoke(ToolInput::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments(_)));
    }
}
