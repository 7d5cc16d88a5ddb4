//! Warm tier: bounded per-session message queues.
//!
//! Every session keeps at most `capacity` messages. A push that overflows the
//! queue removes the oldest entries in the same backend operation and hands
//! them to the [`Archiver`]; the caller never waits on the archive write.
//!
//! Two backends share the [`WarmBackend`] contract. [`select_backend`] probes
//! the configured database and falls back to the JSON file when it does not
//! answer in time.

mod file;
mod sqlite;

pub use file::FileWarmBackend;
pub use sqlite::SqliteWarmBackend;

use super::{Archiver, SessionMessage};
use crate::config::MemoryConfig;
use crate::db::Database;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Storage contract for the Warm tier
#[async_trait]
pub trait WarmBackend: Send + Sync {
    /// Short label used in logs ("sqlite", "file")
    fn kind(&self) -> &'static str;

    /// Append `message`, then remove and return the oldest entries if the
    /// session now holds more than `capacity`. At least `batch_size` entries
    /// are removed on overflow. Both steps happen atomically.
    async fn push_bounded(
        &self,
        session: &str,
        message: &SessionMessage,
        capacity: usize,
        batch_size: usize,
    ) -> Result<Vec<SessionMessage>, EngineError>;

    /// The last `limit` messages, oldest first
    async fn tail(&self, session: &str, limit: usize) -> Result<Vec<SessionMessage>, EngineError>;

    async fn len(&self, session: &str) -> Result<usize, EngineError>;

    async fn set_meta(&self, session: &str, key: &str, value: &Value) -> Result<(), EngineError>;

    async fn get_meta(&self, session: &str, key: &str) -> Result<Option<Value>, EngineError>;

    /// Remove the queue and the metadata of one session
    async fn clear(&self, session: &str) -> Result<(), EngineError>;

    /// Every session as `{session_id: {"chat_history": [...], "metadata": {...}}}`
    async fn dump(&self) -> Result<Value, EngineError>;

    async fn clear_all(&self) -> Result<(), EngineError>;
}

/// Number of entries to remove after a push that left `len` entries
pub(crate) fn overflow_count(len: usize, capacity: usize, batch_size: usize) -> usize {
    if len > capacity {
        (len - capacity).max(batch_size).min(len)
    } else {
        0
    }
}

/// Pick the Warm backend: the configured database when it answers the probe,
/// the local JSON file otherwise.
pub async fn select_backend(config: &MemoryConfig, data_dir: &Path) -> Arc<dyn WarmBackend> {
    if let Some(url) = config.warm_database_url.as_deref() {
        let timeout = Duration::from_secs(config.probe_timeout_secs.max(1));
        match probe(url, timeout).await {
            Ok(db) => {
                tracing::info!("Warm memory connected to {}", url);
                return Arc::new(SqliteWarmBackend::new(db));
            }
            Err(e) => tracing::warn!(
                "Warm memory database unreachable ({}), using local file",
                e
            ),
        }
    }

    let path = config.warm_path(data_dir);
    tracing::info!("Warm memory using file {}", path.display());
    Arc::new(FileWarmBackend::new(path))
}

async fn probe(url: &str, timeout: Duration) -> anyhow::Result<Database> {
    let db = tokio::time::timeout(timeout, async {
        let db = Database::connect(url, Some(timeout)).await?;
        db.ping().await?;
        Ok::<_, anyhow::Error>(db)
    })
    .await
    .map_err(|_| anyhow::anyhow!("probe timed out after {}s", timeout.as_secs()))??;
    Ok(db)
}

/// A handle on one Warm session.
///
/// Cloning is cheap; clones share the backend and the archiver, and
/// [`WarmMemory::for_session`] gives another session over the same storage.
#[derive(Clone)]
pub struct WarmMemory {
    session_id: String,
    backend: Arc<dyn WarmBackend>,
    archiver: Arc<Archiver>,
    capacity: usize,
    batch_size: usize,
}

impl WarmMemory {
    pub fn new(
        session_id: impl Into<String>,
        backend: Arc<dyn WarmBackend>,
        archiver: Arc<Archiver>,
        capacity: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            backend,
            archiver,
            capacity: capacity.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Probe for a backend and open `session_id` on it
    pub async fn connect(
        session_id: impl Into<String>,
        config: &MemoryConfig,
        data_dir: &Path,
        archiver: Arc<Archiver>,
    ) -> Self {
        let backend = select_backend(config, data_dir).await;
        Self::new(
            session_id,
            backend,
            archiver,
            config.warm_capacity,
            config.archive_batch_size,
        )
    }

    pub fn for_session(&self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..self.clone()
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn backend(&self) -> &Arc<dyn WarmBackend> {
        &self.backend
    }

    pub fn archiver(&self) -> &Arc<Archiver> {
        &self.archiver
    }

    /// Append a message stamped with the current time.
    ///
    /// Overflowing entries leave the queue before this returns; their archive
    /// write is scheduled and not awaited (unless the archiver is inline).
    /// Backend failures are logged, never raised.
    pub async fn add_message(&self, role: &str, content: &str) {
        let message = SessionMessage::new(role, content);
        match self
            .backend
            .push_bounded(&self.session_id, &message, self.capacity, self.batch_size)
            .await
        {
            Ok(popped) if !popped.is_empty() => {
                tracing::debug!(
                    "Session {} overflowed, archiving {} message(s)",
                    self.session_id,
                    popped.len()
                );
                self.archiver.archive(popped).await;
            }
            Ok(_) => {}
            Err(e) => tracing::error!(
                "Failed to add message to session {}: {}",
                self.session_id,
                e
            ),
        }
    }

    /// The last `limit` messages, oldest first; empty on backend failure
    pub async fn get_recent_messages(&self, limit: usize) -> Vec<SessionMessage> {
        match self.backend.tail(&self.session_id, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Failed to read session {}: {}", self.session_id, e);
                Vec::new()
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.backend.len(&self.session_id).await.unwrap_or_else(|e| {
            tracing::error!("Failed to count session {}: {}", self.session_id, e);
            0
        })
    }

    pub async fn save_metadata(&self, key: &str, value: Value) {
        if let Err(e) = self.backend.set_meta(&self.session_id, key, &value).await {
            tracing::error!("Failed to save metadata {}: {}", key, e);
        }
    }

    pub async fn get_metadata(&self, key: &str) -> Option<Value> {
        match self.backend.get_meta(&self.session_id, key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to read metadata {}: {}", key, e);
                None
            }
        }
    }

    pub async fn clear_session(&self) {
        match self.backend.clear(&self.session_id).await {
            Ok(()) => tracing::info!("Cleared warm session {}", self.session_id),
            Err(e) => tracing::error!("Failed to clear session {}: {}", self.session_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ArchiveMode, DurableStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingStore {
        writes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DurableStore for CapturingStore {
        async fn store(&self, text: &str, collection: &str) -> Result<String, EngineError> {
            let mut writes = self.writes.lock().unwrap();
            writes.push((text.to_string(), collection.to_string()));
            Ok(writes.len().to_string())
        }

        async fn search(
            &self,
            _query: &str,
            _collection: &str,
            _k: usize,
        ) -> Result<Vec<String>, EngineError> {
            Ok(Vec::new())
        }

        async fn clear(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn test_overflow_count() {
        assert_eq!(overflow_count(10, 10, 1), 0);
        assert_eq!(overflow_count(11, 10, 1), 1);
        assert_eq!(overflow_count(11, 10, 3), 3);
        assert_eq!(overflow_count(14, 10, 1), 4);
        assert_eq!(overflow_count(2, 1, 5), 2);
    }

    #[tokio::test]
    async fn test_file_backend_overflow_archives_inline() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(CapturingStore::default());
        let archiver = Arc::new(Archiver::new(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            None,
            ArchiveMode::Inline,
        ));
        let warm = WarmMemory::new(
            "s1",
            Arc::new(FileWarmBackend::new(dir.path().join("warm.json"))),
            archiver,
            3,
            1,
        );

        for i in 0..4 {
            warm.add_message("User", &format!("m{}", i)).await;
        }

        let recent = warm.get_recent_messages(10).await;
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m1", "m2", "m3"]);

        let writes = store.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].0.contains("m0"));
        assert_eq!(writes[0].1, "chat_logs");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = tempfile::TempDir::new().unwrap();
        let archiver = Arc::new(Archiver::new(
            Arc::new(CapturingStore::default()),
            None,
            ArchiveMode::Inline,
        ));
        let a = WarmMemory::new(
            "a",
            Arc::new(FileWarmBackend::new(dir.path().join("warm.json"))),
            archiver,
            10,
            1,
        );
        let b = a.for_session("b");

        a.add_message("User", "only in a").await;
        a.save_metadata("dataset_path", serde_json::json!("data.csv")).await;

        assert!(b.get_recent_messages(5).await.is_empty());
        assert_eq!(b.get_metadata("dataset_path").await, None);
        assert_eq!(
            a.get_metadata("dataset_path").await,
            Some(serde_json::json!("data.csv"))
        );

        a.clear_session().await;
        assert_eq!(a.len().await, 0);
        assert_eq!(a.get_metadata("dataset_path").await, None);
    }

    #[tokio::test]
    async fn test_unreachable_database_falls_back_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = MemoryConfig {
            warm_database_url: Some(format!(
                "sqlite:{}",
                dir.path().join("missing").join("warm.db").display()
            )),
            probe_timeout_secs: 1,
            ..MemoryConfig::default()
        };

        let backend = select_backend(&config, dir.path()).await;
        assert_eq!(backend.kind(), "file");
    }
}
