//! chat_log_search tool: keyword search over the archived chat logs.

use crate::memory::{DurableStore, CHAT_LOGS};
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::Tool;
use sdk::types::ToolInput;
use serde_json::json;
use std::sync::Arc;

const MAX_HIT_CHARS: usize = 1000;
const DEFAULT_TOP_K: i64 = 2;

pub struct ChatLogSearchTool {
    store: Arc<dyn DurableStore>,
}

impl ChatLogSearchTool {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }
}

fn truncate_hit(hit: &str) -> String {
    if hit.chars().count() <= MAX_HIT_CHARS {
        return hit.to_string();
    }
    let head: String = hit.chars().take(MAX_HIT_CHARS).collect();
    format!("{}... [TRUNCATED]", head)
}

#[async_trait]
impl Tool for ChatLogSearchTool {
    fn name(&self) -> &str {
        "chat_log_search"
    }

    fn description(&self) -> &str {
        "Search archived chat history for earlier requests and agent results."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Words to look for"},
                "top_k": {"type": "integer", "description": "Maximum number of hits", "default": DEFAULT_TOP_K}
            },
            "required": ["query"]
        })
    }

    fn primary_param(&self) -> &str {
        "query"
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, EngineError> {
        let query = input
            .param_str("query")
            .map_err(|e| EngineError::InvalidArguments(e.to_string()))?;
        let top_k = input.param_i64_opt("top_k").unwrap_or(DEFAULT_TOP_K).clamp(1, 20) as usize;

        let hits = self.store.search(&query, CHAT_LOGS, top_k).await?;
        if hits.is_empty() {
            return Ok(format!("No archived conversations match '{}'.", query));
        }

        Ok(hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("{}. {}", i + 1, truncate_hit(hit)))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::memory::SqliteFtsStore;

    #[test]
    fn test_truncate_hit() {
        assert_eq!(truncate_hit("short"), "short");
        let long = "x".repeat(1500);
        let out = truncate_hit(&long);
        assert!(out.ends_with("... [TRUNCATED]"));
        assert_eq!(out.chars().count(), 1000 + "... [TRUNCATED]".len());
    }

    #[tokio::test]
    async fn test_search_formats_hits() {
        let store = Arc::new(SqliteFtsStore::new(Database::in_memory().await.unwrap()));
        store
            .store("[t, train model, Trainer, accuracy 0.91, training]", CHAT_LOGS)
            .await
            .unwrap();

        let tool = ChatLogSearchTool::new(store);
        let out = tool
            .invoke(ToolInput::new().with_param("query", json!("accuracy")))
            .await
            .unwrap();
        assert_eq!(out, "1. [t, train model, Trainer, accuracy 0.91, training]");

        let none = tool
            .invoke(ToolInput::new().with_param("query", json!("forecast")))
            .await
            .unwrap();
        assert!(none.starts_with("No archived conversations"));
    }
}
