//! Hot tier: the global project context.
//!
//! A single string shared by every worker. It is written wholesale by the
//! context-building flow and cleared on `/reset`; it is never partially updated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Returned by [`HotMemory::get_context`] while no context has been built
pub const NO_CONTEXT: &str = "No global context set. Please run Contextor first.";

#[derive(Debug, Serialize, Deserialize)]
struct HotFile {
    global_project_context: String,
    timestamp: String,
}

pub struct HotMemory {
    path: PathBuf,
    context: RwLock<String>,
}

impl HotMemory {
    /// Load the context stored at `path`.
    ///
    /// A missing or unreadable file starts the tier empty; a missing file is
    /// created so the on-disk shape exists from the first run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let context = if path.exists() {
            read_context(&path)
        } else {
            String::new()
        };

        let hot = Self {
            path,
            context: RwLock::new(context),
        };
        if !hot.path.exists() {
            hot.persist("");
        }
        hot
    }

    /// The global context, or [`NO_CONTEXT`] when empty
    pub fn get_context(&self) -> String {
        let context = self.context.read().unwrap_or_else(|e| e.into_inner());
        if context.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            context.clone()
        }
    }

    /// True while the context is unset
    pub fn is_empty(&self) -> bool {
        self.context
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Replace the context and persist it.
    ///
    /// A write failure is logged; the in-memory value is updated regardless.
    pub fn set_context(&self, context: impl Into<String>) {
        let context = context.into();
        self.persist(&context);
        *self.context.write().unwrap_or_else(|e| e.into_inner()) = context;
        tracing::info!("Global project context updated");
    }

    pub fn clear(&self) {
        self.set_context(String::new());
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, context: &str) {
        let file = HotFile {
            global_project_context: context.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let result = serde_json::to_string_pretty(&file)
            .map_err(std::io::Error::other)
            .and_then(|json| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, json)
            });

        if let Err(e) = result {
            tracing::error!(
                "Failed to persist hot memory to {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn read_context(path: &Path) -> String {
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str::<HotFile>(&raw).map_err(|e| e.to_string()))
    {
        Ok(file) => file.global_project_context,
        Err(e) => {
            tracing::error!("Failed to load hot memory from {}: {}", path.display(), e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hot_memory.json");

        let hot = HotMemory::load(&path);
        assert!(path.exists());
        assert!(hot.is_empty());
        assert_eq!(hot.get_context(), NO_CONTEXT);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["global_project_context"], "");
        assert!(raw["timestamp"].is_string());
    }

    #[test]
    fn test_context_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hot_memory.json");

        HotMemory::load(&path).set_context("Sales data, 12 columns, target=revenue");
        let reloaded = HotMemory::load(&path);
        assert_eq!(
            reloaded.get_context(),
            "Sales data, 12 columns, target=revenue"
        );
    }

    #[test]
    fn test_sentinel_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let hot = HotMemory::load(dir.path().join("hot.json"));
        hot.set_context("ctx");
        hot.clear();
        assert_eq!(hot.get_context(), NO_CONTEXT);
        assert_eq!(hot.get_context(), NO_CONTEXT);
        assert!(hot.get_context().contains("No global context set"));
    }

    #[test]
    fn test_whitespace_context_is_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let hot = HotMemory::load(dir.path().join("hot.json"));
        hot.set_context("   ");
        assert!(!hot.is_empty());
        assert_eq!(hot.get_context(), "   ");
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hot.json");
        std::fs::write(&path, "{not json").unwrap();

        let hot = HotMemory::load(&path);
        assert_eq!(hot.get_context(), NO_CONTEXT);
    }

    #[test]
    fn test_write_failure_still_updates_memory() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the file makes every write fail
        let path = dir.path().join("blocked");
        std::fs::create_dir(&path).unwrap();

        let hot = HotMemory::load(&path);
        hot.set_context("kept in memory");
        assert_eq!(hot.get_context(), "kept in memory");
    }
}
