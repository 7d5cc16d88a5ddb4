//! Warm backend over a local JSON file.
//!
//! The file maps `"chat:<session>"` to an array of messages and
//! `"meta:<session>"` to an object of metadata values. It is re-read before
//! every operation so several processes can share it.
//!
//! Writes go to a sibling temp file that is renamed over the target, so a
//! reader never sees a half-written file. A file that does not parse is moved
//! to `<name>.corrupt` before anything new is written.

use super::{overflow_count, WarmBackend};
use crate::memory::SessionMessage;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const CHAT_PREFIX: &str = "chat:";
const META_PREFIX: &str = "meta:";

fn chat_key(session: &str) -> String {
    format!("{}{}", CHAT_PREFIX, session)
}

fn meta_key(session: &str) -> String {
    format!("{}{}", META_PREFIX, session)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Older dumps hold structured metadata as JSON-encoded strings
fn decode_legacy(value: Value) -> Value {
    match value {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => Value::String(raw),
        },
        other => other,
    }
}

pub struct FileWarmBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileWarmBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Map<String, Value> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", self.path.display(), e);
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                let aside = with_suffix(&self.path, ".corrupt");
                match tokio::fs::rename(&self.path, &aside).await {
                    Ok(()) => tracing::error!(
                        "Warm memory file {} is corrupt, moved to {} and starting empty",
                        self.path.display(),
                        aside.display()
                    ),
                    Err(e) => tracing::error!(
                        "Warm memory file {} is corrupt and could not be moved aside: {}",
                        self.path.display(),
                        e
                    ),
                }
                Map::new()
            }
        }
    }

    async fn save(&self, store: &Map<String, Value>) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(store)
            .map_err(|e| EngineError::Memory(e.to_string()))?;
        let tmp = with_suffix(&self.path, ".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn messages(store: &Map<String, Value>, session: &str) -> Vec<SessionMessage> {
        store
            .get(&chat_key(session))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl WarmBackend for FileWarmBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn push_bounded(
        &self,
        session: &str,
        message: &SessionMessage,
        capacity: usize,
        batch_size: usize,
    ) -> Result<Vec<SessionMessage>, EngineError> {
        let _guard = self.lock.lock().await;
        let mut store = self.load().await;

        let mut messages = Self::messages(&store, session);
        messages.push(message.clone());

        let excess = overflow_count(messages.len(), capacity, batch_size);
        let popped: Vec<SessionMessage> = messages.drain(..excess).collect();

        let items = serde_json::to_value(&messages).map_err(|e| EngineError::Memory(e.to_string()))?;
        store.insert(chat_key(session), items);
        self.save(&store).await?;
        Ok(popped)
    }

    async fn tail(&self, session: &str, limit: usize) -> Result<Vec<SessionMessage>, EngineError> {
        let _guard = self.lock.lock().await;
        let mut messages = Self::messages(&self.load().await, session);
        let start = messages.len().saturating_sub(limit);
        Ok(messages.split_off(start))
    }

    async fn len(&self, session: &str) -> Result<usize, EngineError> {
        let _guard = self.lock.lock().await;
        Ok(Self::messages(&self.load().await, session).len())
    }

    async fn set_meta(&self, session: &str, key: &str, value: &Value) -> Result<(), EngineError> {
        let _guard = self.lock.lock().await;
        let mut store = self.load().await;
        let meta = store
            .entry(meta_key(session))
            .or_insert_with(|| json!({}));
        if !meta.is_object() {
            *meta = json!({});
        }
        if let Some(map) = meta.as_object_mut() {
            map.insert(key.to_string(), value.clone());
        }
        self.save(&store).await
    }

    async fn get_meta(&self, session: &str, key: &str) -> Result<Option<Value>, EngineError> {
        let _guard = self.lock.lock().await;
        let store = self.load().await;
        Ok(store
            .get(&meta_key(session))
            .and_then(|meta| meta.get(key))
            .cloned()
            .map(decode_legacy))
    }

    async fn clear(&self, session: &str) -> Result<(), EngineError> {
        let _guard = self.lock.lock().await;
        let mut store = self.load().await;
        store.remove(&chat_key(session));
        store.remove(&meta_key(session));
        self.save(&store).await
    }

    async fn dump(&self) -> Result<Value, EngineError> {
        let _guard = self.lock.lock().await;
        let store = self.load().await;

        let mut sessions = Map::new();
        for (key, value) in store {
            let (session, field) = if let Some(id) = key.strip_prefix(CHAT_PREFIX) {
                (id.to_string(), "chat_history")
            } else if let Some(id) = key.strip_prefix(META_PREFIX) {
                (id.to_string(), "metadata")
            } else {
                continue;
            };
            let entry = sessions
                .entry(session)
                .or_insert_with(|| json!({"chat_history": [], "metadata": {}}));
            entry[field] = value;
        }
        Ok(Value::Object(sessions))
    }

    async fn clear_all(&self) -> Result<(), EngineError> {
        let _guard = self.lock.lock().await;
        self.save(&Map::new()).await
    }
}
