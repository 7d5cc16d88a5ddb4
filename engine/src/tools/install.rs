//! install_package tool: `pip install` into the configured interpreter.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::Tool;
use sdk::types::ToolInput;
use serde_json::json;
use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Decides whether a package may be installed
#[async_trait]
pub trait InstallApproval: Send + Sync {
    async fn approve(&self, package: &str) -> bool;
}

/// Asks on the terminal; anything but `y` denies
pub struct TerminalApproval;

#[async_trait]
impl InstallApproval for TerminalApproval {
    async fn approve(&self, package: &str) -> bool {
        let prompt = format!(
            "⚠️  Agent wants to install '{}'. Allow? (y/n): ",
            package
        );
        tokio::task::spawn_blocking(move || {
            print!("{}", prompt);
            let _ = std::io::stdout().flush();
            let mut answer = String::new();
            std::io::stdin()
                .read_line(&mut answer)
                .map(|_| answer.trim().eq_ignore_ascii_case("y"))
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

pub struct AutoApprove;

#[async_trait]
impl InstallApproval for AutoApprove {
    async fn approve(&self, _package: &str) -> bool {
        true
    }
}

/// Package specs pip accepts, without options or paths
fn is_valid_package(spec: &str) -> bool {
    !spec.is_empty()
        && !spec.starts_with('-')
        && spec
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.[],=<>!~".contains(c))
}

pub struct InstallPackageTool {
    python: String,
    timeout: Duration,
    approval: Arc<dyn InstallApproval>,
}

impl InstallPackageTool {
    pub fn new(python: impl Into<String>, timeout: Duration, approval: Arc<dyn InstallApproval>) -> Self {
        Self {
            python: python.into(),
            timeout,
            approval,
        }
    }

    pub async fn install(&self, package: &str) -> Result<String, EngineError> {
        let package = package.trim();
        if !is_valid_package(package) {
            return Err(EngineError::InvalidArguments(format!(
                "'{}' is not a package name",
                package
            )));
        }

        if !self.approval.approve(package).await {
            return Ok(format!("User denied installation of package '{}'.", package));
        }

        tracing::info!("Installing package {}", package);
        let child = Command::new(&self.python)
            .args(["-m", "pip", "install", package])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::ToolError(format!("Error installing package: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                EngineError::ToolError(format!(
                    "Installation of '{}' timed out after {} seconds",
                    package,
                    self.timeout.as_secs()
                ))
            })??;

        if output.status.success() {
            Ok(format!("Successfully installed '{}'.", package))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(format!(
                "Failed to install '{}'. Error: {}",
                package,
                stderr.trim()
            ))
        }
    }
}

#[async_trait]
impl Tool for InstallPackageTool {
    fn name(&self) -> &str {
        "install_package"
    }

    fn description(&self) -> &str {
        "Installs a Python package using pip. Use this ONLY when you encounter a \
         ModuleNotFoundError or ImportError."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "package_name": {"type": "string", "description": "Package to install, e.g. lightgbm"}
            },
            "required": ["package_name"]
        })
    }

    fn primary_param(&self) -> &str {
        "package_name"
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, EngineError> {
        let package = input
            .param_str_opt("package_name")
            .or_else(|| input.param_str_opt("package"))
            .ok_or_else(|| EngineError::InvalidArguments("missing package_name".to_string()))?;
        self.install(&package).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Deny;

    #[async_trait]
    impl InstallApproval for Deny {
        async fn approve(&self, _package: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_package_name_validation() {
        assert!(is_valid_package("lightgbm"));
        assert!(is_valid_package("scikit-learn==1.5.0"));
        assert!(is_valid_package("pandas[performance]"));
        assert!(!is_valid_package("--index-url=http://evil"));
        assert!(!is_valid_package("pkg; rm -rf /"));
        assert!(!is_valid_package(""));
    }

    #[tokio::test]
    async fn test_denied_install_is_reported() {
        let tool = InstallPackageTool::new("python3", Duration::from_secs(5), Arc::new(Deny));
        let out = tool
            .invoke(ToolInput::new().with_param("package_name", json!("lightgbm")))
            .await
            .unwrap();
        assert_eq!(out, "User denied installation of package 'lightgbm'.");
    }

    #[tokio::test]
    async fn test_invalid_name_never_reaches_pip() {
        let tool = InstallPackageTool::new("python3", Duration::from_secs(5), Arc::new(AutoApprove));
        let err = tool.install("-r requirements.txt").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments(_)));
    }
}
