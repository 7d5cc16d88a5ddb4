//! Tool input types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arguments of a single tool invocation, as decoded from the model's call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub params: HashMap<String, serde_json::Value>,
}

impl ToolInput {
    /// Create an empty input
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode tool arguments from the raw JSON string a model produced.
    ///
    /// An empty string is treated as `{}`. A bare JSON string is accepted and
    /// stored under `fallback_key`, since models sometimes pass the single
    /// argument of a tool without wrapping it in an object.
    pub fn from_json(raw: &str, fallback_key: &str) -> Result<Self, ToolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new());
        }

        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| ToolError::InvalidParameter(format!("arguments are not JSON: {}", e)))?;

        match value {
            serde_json::Value::Object(map) => Ok(Self {
                params: map.into_iter().collect(),
            }),
            serde_json::Value::String(s) => {
                Ok(Self::new().with_param(fallback_key, serde_json::Value::String(s)))
            }
            serde_json::Value::Null => Ok(Self::new()),
            other => Err(ToolError::InvalidParameter(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Get an optional i64 parameter
    pub fn param_i64_opt(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object() {
        let input = ToolInput::from_json(r#"{"code": "print(1)", "k": 3}"#, "code").unwrap();
        assert_eq!(input.param_str("code").unwrap(), "print(1)");
        assert_eq!(input.param_i64_opt("k"), Some(3));
    }

    #[test]
    fn test_from_json_empty_is_empty_object() {
        let input = ToolInput::from_json("  ", "code").unwrap();
        assert!(input.params.is_empty());
    }

    #[test]
    fn test_from_json_bare_string_uses_fallback_key() {
        let input = ToolInput::from_json(r#""pandas""#, "package").unwrap();
        assert_eq!(input.param_str("package").unwrap(), "pandas");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result = ToolInput::from_json("{not json", "code");
        assert!(matches!(result, Err(ToolError::InvalidParameter(_))));
    }

    #[test]
    fn test_from_json_rejects_array() {
        let result = ToolInput::from_json("[1, 2]", "code");
        assert!(result.is_err());
    }

    #[test]
    fn test_param_str_missing() {
        let input = ToolInput::new().with_param("other", json!(1));
        assert!(matches!(
            input.param_str("code").unwrap_err(),
            ToolError::MissingParameter(_)
        ));
        assert_eq!(input.param_str_opt("code"), None);
    }
}
