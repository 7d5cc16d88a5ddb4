//! python_interpreter tool
//!
//! Runs a code snippet with the configured interpreter in the tools working
//! directory. Snippets importing process or filesystem control modules, or
//! calling exec/eval, are refused before anything is spawned.
//!
//! Each run is a fresh process. Workers hand dataframes to each other through
//! `save_df(df, tag)` / `load_df(tag)`, defined by a prelude over a cache
//! directory in the working directory.

use async_trait::async_trait;
use regex::Regex;
use sdk::errors::EngineError;
use sdk::tool::Tool;
use sdk::types::ToolInput;
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const NO_OUTPUT: &str = "✅ Code executed successfully (No output).";

const PRELUDE: &str = r#"import pathlib as _pathlib
_CACHE = _pathlib.Path("_shared_cache")
_CACHE.mkdir(exist_ok=True)
def save_df(df, tag):
    df.to_pickle(_CACHE / f"{tag}.pkl")
def load_df(tag):
    import pandas as _pd
    return _pd.read_pickle(_CACHE / f"{tag}.pkl")
def list_data():
    return sorted(p.stem for p in _CACHE.glob("*.pkl"))
"#;

static FORBIDDEN_PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn forbidden_patterns() -> &'static Vec<(Regex, &'static str)> {
    FORBIDDEN_PATTERNS.get_or_init(|| {
        [
            (
                r"(?m)^\s*(?:import|from)\s+(?:os|subprocess|shutil|sys)\b",
                "🚫 Security Violation: importing os, subprocess, shutil or sys is restricted.",
            ),
            (
                r"\b(?:exec|eval)\s*\(",
                "🚫 Security Violation: 'exec' and 'eval' are strictly forbidden.",
            ),
        ]
        .into_iter()
        .filter_map(|(p, msg)| Regex::new(p).ok().map(|re| (re, msg)))
        .collect()
    })
}

/// The refusal message for `code`, if any
pub fn validate_code(code: &str) -> Option<&'static str> {
    forbidden_patterns()
        .iter()
        .find(|(re, _)| re.is_match(code))
        .map(|(_, msg)| *msg)
}

pub struct PythonInterpreterTool {
    python: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl PythonInterpreterTool {
    pub fn new(python: impl Into<String>, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub async fn run(&self, code: &str) -> Result<String, EngineError> {
        if let Some(refusal) = validate_code(code) {
            warn!("Refused python snippet: {}", refusal);
            return Ok(refusal.to_string());
        }

        debug!("Running python snippet ({} bytes)", code.len());

        let child = Command::new(&self.python)
            .arg("-c")
            .arg(format!("{}{}", PRELUDE, code))
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::ToolError(format!("Failed to start {}: {}", self.python, e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Python snippet timed out after {}s", self.timeout.as_secs());
                return Err(EngineError::ToolError(format!(
                    "Execution timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Ok(format!("❌ Execution Error:\n{}{}", stdout, stderr));
        }

        let combined = if stderr.trim().is_empty() {
            stdout
        } else {
            format!("{}{}", stdout, stderr)
        };

        if combined.trim().is_empty() {
            Ok(NO_OUTPUT.to_string())
        } else {
            Ok(combined)
        }
    }
}

#[async_trait]
impl Tool for PythonInterpreterTool {
    fn name(&self) -> &str {
        "python_interpreter"
    }

    fn description(&self) -> &str {
        "Executes Python code for data analysis and returns what it prints. \
         ALWAYS print() the results you want to see."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Python source to execute"}
            },
            "required": ["code"]
        })
    }

    fn primary_param(&self) -> &str {
        "code"
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, EngineError> {
        let code = input
            .param_str("code")
            .map_err(|e| EngineError::InvalidArguments(e.to_string()))?;
        self.run(&code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("import os\nos.remove('x')").is_some());
        assert!(validate_code("from subprocess import run").is_some());
        assert!(validate_code("eval('1+1')").is_some());
        assert!(validate_code("import pandas as pd\nprint(pd.__version__)").is_none());
        // Module names merely containing a forbidden name are fine
        assert!(validate_code("import osmnx").is_none());
        assert!(validate_code("df.evaluate()").is_none());
    }

    #[tokio::test]
    async fn test_refusal_is_returned_as_text() {
        let tool = PythonInterpreterTool::new("python3", ".", Duration::from_secs(5));
        let out = tool.run("import shutil").await.unwrap();
        assert!(out.starts_with("🚫"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_tool_error() {
        let tool = PythonInterpreterTool::new(
            "definitely-not-a-python-binary",
            ".",
            Duration::from_secs(5),
        );
        let err = tool.run("print(1)").await.unwrap_err();
        assert!(matches!(err, EngineError::ToolError(_)));
    }

    #[tokio::test]
    async fn test_missing_code_argument() {
        let tool = PythonInterpreterTool::new("python3", ".", Duration::from_secs(5));
        let err = tool.invoke(ToolInput::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments(_)));
    }
}
