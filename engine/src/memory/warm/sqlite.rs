//! Warm backend over the SQLite pool (`warm_messages`, `warm_metadata`).

use super::{overflow_count, WarmBackend};
use crate::db::Database;
use crate::memory::SessionMessage;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde_json::{json, Map, Value};
use sqlx::Row;
use tokio::sync::Mutex;

fn db_err(e: sqlx::Error) -> EngineError {
    EngineError::Memory(e.to_string())
}

fn decode(payload: &str) -> Result<SessionMessage, EngineError> {
    serde_json::from_str(payload).map_err(|e| EngineError::Memory(format!("corrupt message: {}", e)))
}

pub struct SqliteWarmBackend {
    db: Database,
    /// Serializes push-and-trim so concurrent writers cannot interleave
    write_lock: Mutex<()>,
}

impl SqliteWarmBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl WarmBackend for SqliteWarmBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn push_bounded(
        &self,
        session: &str,
        message: &SessionMessage,
        capacity: usize,
        batch_size: usize,
    ) -> Result<Vec<SessionMessage>, EngineError> {
        let payload =
            serde_json::to_string(message).map_err(|e| EngineError::Memory(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;

        sqlx::query("INSERT INTO warm_messages (session_id, payload, created_at) VALUES (?, ?, ?)")
            .bind(session)
            .bind(&payload)
            .bind(&message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warm_messages WHERE session_id = ?")
            .bind(session)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        let excess = overflow_count(len.max(0) as usize, capacity, batch_size);
        let mut popped = Vec::with_capacity(excess);
        if excess > 0 {
            let rows = sqlx::query(
                "SELECT id, payload FROM warm_messages WHERE session_id = ? ORDER BY id ASC LIMIT ?",
            )
            .bind(session)
            .bind(excess as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;

            for row in rows {
                let id: i64 = row.get("id");
                let payload: String = row.get("payload");
                sqlx::query("DELETE FROM warm_messages WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                popped.push(decode(&payload)?);
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(popped)
    }

    async fn tail(&self, session: &str, limit: usize) -> Result<Vec<SessionMessage>, EngineError> {
        let payloads: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT payload FROM (
                SELECT id, payload FROM warm_messages
                WHERE session_id = ?
                ORDER BY id DESC
                LIMIT ?
            ) ORDER BY id ASC
            "#,
        )
        .bind(session)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err)?;

        payloads.iter().map(|p| decode(p)).collect()
    }

    async fn len(&self, session: &str) -> Result<usize, EngineError> {
        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warm_messages WHERE session_id = ?")
            .bind(session)
            .fetch_one(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(len.max(0) as usize)
    }

    async fn set_meta(&self, session: &str, key: &str, value: &Value) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO warm_metadata (session_id, key, value) VALUES (?, ?, ?)
            ON CONFLICT(session_id, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(session)
        .bind(key)
        .bind(value.to_string())
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_meta(&self, session: &str, key: &str) -> Result<Option<Value>, EngineError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM warm_metadata WHERE session_id = ? AND key = ?")
                .bind(session)
                .bind(key)
                .fetch_optional(self.db.pool())
                .await
                .map_err(db_err)?;

        // Values written by hand may not be JSON; hand them back as strings
        Ok(raw.map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw))))
    }

    async fn clear(&self, session: &str) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM warm_messages WHERE session_id = ?")
            .bind(session)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM warm_metadata WHERE session_id = ?")
            .bind(session)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn dump(&self) -> Result<Value, EngineError> {
        let mut sessions = Map::new();

        let rows = sqlx::query("SELECT session_id, payload FROM warm_messages ORDER BY id ASC")
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        for row in rows {
            let session: String = row.get("session_id");
            let payload: String = row.get("payload");
            let entry = sessions
                .entry(session)
                .or_insert_with(|| json!({"chat_history": [], "metadata": {}}));
            if let Some(history) = entry["chat_history"].as_array_mut() {
                history.push(serde_json::from_str(&payload).unwrap_or(Value::String(payload)));
            }
        }

        let rows = sqlx::query("SELECT session_id, key, value FROM warm_metadata")
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        for row in rows {
            let session: String = row.get("session_id");
            let key: String = row.get("key");
            let raw: String = row.get("value");
            let entry = sessions
                .entry(session)
                .or_insert_with(|| json!({"chat_history": [], "metadata": {}}));
            if let Some(metadata) = entry["metadata"].as_object_mut() {
                metadata.insert(key, serde_json::from_str(&raw).unwrap_or(Value::String(raw)));
            }
        }

        Ok(Value::Object(sessions))
    }

    async fn clear_all(&self) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM warm_messages")
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM warm_metadata")
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
