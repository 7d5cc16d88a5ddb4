//! Cold tier: durable append-only archive with keyword search.
//!
//! Documents live in `cold_documents`; an FTS5 index mirrors them through
//! triggers. Search ranks by bm25 over any of the query's words.

use crate::db::Database;
use async_trait::async_trait;
use sdk::errors::EngineError;

/// Archived chat messages
pub const CHAT_LOGS: &str = "chat_logs";

/// Dataset summaries and the interview context
pub const CONTEXT_STORE: &str = "context_store";

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store `text` in `collection`, returning the new document id
    async fn store(&self, text: &str, collection: &str) -> Result<String, EngineError>;

    /// Up to `k` documents of `collection` matching `query`, best first
    async fn search(&self, query: &str, collection: &str, k: usize)
        -> Result<Vec<String>, EngineError>;

    /// Remove every document of every collection
    async fn clear(&self) -> Result<(), EngineError>;

    /// Store a labelled context document in [`CONTEXT_STORE`]
    async fn update_context(
        &self,
        text: &str,
        section: &str,
        dataset: &str,
        agent: &str,
    ) -> Result<String, EngineError> {
        let document = format!(
            "SECTION: {}\nDATASET: {}\nAGENT: {}\nCONTENT: {}",
            section, dataset, agent, text
        );
        self.store(&document, CONTEXT_STORE).await
    }
}

pub struct SqliteFtsStore {
    db: Database,
}

impl SqliteFtsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn count(&self, collection: &str) -> Result<i64, EngineError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM cold_documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| EngineError::Database(e.to_string()))
    }
}

/// FTS5 MATCH expression: every word quoted, joined with OR.
///
/// Returns `None` when the query has no searchable words.
pub(crate) fn match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();

    (!terms.is_empty()).then(|| terms.join(" OR "))
}

#[async_trait]
impl DurableStore for SqliteFtsStore {
    async fn store(&self, text: &str, collection: &str) -> Result<String, EngineError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO cold_documents (id, collection, content) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(collection)
            .bind(text)
            .execute(self.db.pool())
            .await
            .map_err(|e| EngineError::Archive(e.to_string()))?;

        tracing::debug!("Stored document {} in {}", id, collection);
        Ok(id)
    }

    async fn search(
        &self,
        query: &str,
        collection: &str,
        k: usize,
    ) -> Result<Vec<String>, EngineError> {
        let Some(expression) = match_expression(query) else {
            return Ok(Vec::new());
        };

        sqlx::query_scalar(
            r#"
            SELECT content FROM cold_documents_fts
            WHERE cold_documents_fts MATCH ? AND collection = ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(expression)
        .bind(collection)
        .bind(k as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| EngineError::Database(format!("Cold search failed: {}", e)))
    }

    async fn clear(&self) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM cold_documents")
            .execute(self.db.pool())
            .await
            .map_err(|e| EngineError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when the archive database cannot be opened.
///
/// Writes fail (and are logged by the archiver); searches find nothing.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl DurableStore for UnavailableStore {
    async fn store(&self, _text: &str, _collection: &str) -> Result<String, EngineError> {
        Err(EngineError::Archive(format!(
            "cold storage unavailable: {}",
            self.reason
        )))
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

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteFtsStore {
        SqliteFtsStore::new(Database::in_memory().await.unwrap())
    }

    #[test]
    fn test_match_expression_quotes_words() {
        assert_eq!(
            match_expression("missing values?").as_deref(),
            Some("\"missing\" OR \"values\"")
        );
        assert_eq!(
            match_expression("col \"x\" AND NOT y").as_deref(),
            Some("\"col\" OR \"x\" OR \"and\" OR \"not\" OR \"y\"")
        );
        assert_eq!(match_expression("  ?! "), None);
    }

    #[tokio::test]
    async fn test_store_and_search_within_collection() {
        let cold = store().await;
        cold.store("[t1, drop null rows, Cleaner, dropped 12 rows, nulls]", CHAT_LOGS)
            .await
            .unwrap();
        cold.store("[t2, plot revenue, Visualizer, saved chart, plot]", CHAT_LOGS)
            .await
            .unwrap();
        cold.store("null handling policy", CONTEXT_STORE).await.unwrap();

        let hits = cold.search("null rows", CHAT_LOGS, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("dropped 12 rows"));

        assert_eq!(cold.count(CHAT_LOGS).await.unwrap(), 2);
        assert!(cold.search("", CHAT_LOGS, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let cold = store().await;
        let a = cold.store("same text", CHAT_LOGS).await.unwrap();
        let b = cold.store("same text", CHAT_LOGS).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(cold.search("same", CHAT_LOGS, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_context_format() {
        let cold = store().await;
        cold.update_context("12 columns", "Data_summary", "sales.csv", "Contextor")
            .await
            .unwrap();

        let hits = cold.search("columns", CONTEXT_STORE, 1).await.unwrap();
        assert_eq!(
            hits[0],
            "SECTION: Data_summary\nDATASET: sales.csv\nAGENT: Contextor\nCONTENT: 12 columns"
        );
    }

    #[tokio::test]
    async fn test_clear_empties_index() {
        let cold = store().await;
        cold.store("archived", CHAT_LOGS).await.unwrap();
        cold.clear().await.unwrap();
        assert!(cold.search("archived", CHAT_LOGS, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let cold = UnavailableStore::new("disk full");
        assert!(cold.store("x", CHAT_LOGS).await.is_err());
        assert!(cold.search("x", CHAT_LOGS, 3).await.unwrap().is_empty());
    }
}
