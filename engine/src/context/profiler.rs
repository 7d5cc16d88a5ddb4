//! Dataset profiling.
//!
//! [`PythonProfiler`] runs an embedded pandas script that renders a Markdown
//! summary of every table it finds at the source: a file (csv, xlsx/xls,
//! parquet), a folder of such files, a URL to one, or a database URL.

use async_trait::async_trait;
use sdk::errors::EngineError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Exit code the script uses for sources it cannot read as tables
const UNKNOWN_SOURCE_EXIT: i32 = 3;

const PROFILE_SCRIPT: &str = include_str!("../../scripts/profile.py");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Url,
    File,
    Folder,
    Database,
}

/// Classify `source` without reading it
pub fn classify_source(source: &str) -> Result<SourceKind, EngineError> {
    let source = source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(SourceKind::Url);
    }
    let path = Path::new(source);
    if path.is_file() {
        Ok(SourceKind::File)
    } else if path.is_dir() {
        Ok(SourceKind::Folder)
    } else if source.contains("://") {
        Ok(SourceKind::Database)
    } else {
        Err(EngineError::UnknownSourceType(source.to_string()))
    }
}

#[async_trait]
pub trait Profiler: Send + Sync {
    /// Markdown summary of every table at `source`
    async fn summarize(&self, source: &str) -> Result<String, EngineError>;
}

pub struct PythonProfiler {
    python: String,
    timeout: Duration,
}

impl PythonProfiler {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Profiler for PythonProfiler {
    async fn summarize(&self, source: &str) -> Result<String, EngineError> {
        let kind = classify_source(source)?;
        info!("Profiling {:?} source: {}", kind, source);

        let child = Command::new(&self.python)
            .arg("-c")
            .arg(PROFILE_SCRIPT)
            .arg(source.trim())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Profiler(format!("Failed to start {}: {}", self.python, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                EngineError::Profiler(format!(
                    "Profiling timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        if output.status.code() == Some(UNKNOWN_SOURCE_EXIT) {
            return Err(EngineError::UnknownSourceType(source.trim().to_string()));
        }
        if !output.status.success() {
            return Err(EngineError::Profiler(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let summary = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Profile summary: {} chars", summary.len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("sales.csv");
        std::fs::write(&file, "a,b\n1,2\n").unwrap();

        assert_eq!(classify_source(file.to_str().unwrap()).unwrap(), SourceKind::File);
        assert_eq!(classify_source(dir.path().to_str().unwrap()).unwrap(), SourceKind::Folder);
        assert_eq!(classify_source("https://x.io/a.csv").unwrap(), SourceKind::Url);
        assert_eq!(
            classify_source("postgresql://user@localhost/shop").unwrap(),
            SourceKind::Database
        );
        assert!(matches!(
            classify_source("/no/such/file.csv"),
            Err(EngineError::UnknownSourceType(_))
        ));
    }

    #[test]
    fn test_profile_script_is_embedded_whole() {
        assert!(PROFILE_SCRIPT.starts_with("import os, sys"));
        assert!(PROFILE_SCRIPT.contains("\"## Table Summary\""));
        assert!(PROFILE_SCRIPT.contains("f\"### {n}\\n\""));
        assert!(PROFILE_SCRIPT.contains(&format!("sys.exit({})", UNKNOWN_SOURCE_EXIT)));
        assert!(PROFILE_SCRIPT.trim_end().ends_with("print(\"\\n\\n\".join(pieces))"));
    }

    #[tokio::test]
    async fn test_unknown_source_never_spawns() {
        let profiler = PythonProfiler::new("definitely-not-a-python-binary", Duration::from_secs(5));
        let err = profiler.summarize("nowhere.csv").await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownSourceType(_)));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_profiler_error() {
        let dir = TempDir::new().unwrap();
        let profiler = PythonProfiler::new("definitely-not-a-python-binary", Duration::from_secs(5));
        let err = profiler
            .summarize(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Profiler(_)));
    }
}
