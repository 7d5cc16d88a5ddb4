//! Warm → Cold archival.
//!
//! Messages popped from a Warm session get a best-effort summary and are
//! written to the [`CHAT_LOGS`] collection. In [`ArchiveMode::Background`]
//! every batch runs on its own tokio task; nothing waits for it except
//! [`Archiver::drain`]. Failures are logged and dropped.

use super::{is_user_role, DurableStore, SessionMessage, CHAT_LOGS};
use crate::llm::{LLMError, LLMRouter, Message};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub const SUMMARY_RATE_LIMITED: &str = "[Summary skipped - rate limit]";
pub const SUMMARY_FAILED: &str = "[Summary generation failed]";

/// Agent name used when an agent message is archived without its own label
const DEFAULT_AGENT: &str = "Archived_Agent";

/// Produces the retrieval summary of one archived message
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, content: &str) -> Result<String, LLMError>;
}

fn summary_prompt(content: &str) -> String {
    format!(
        "Summarize this chat message for future retrieval. Keep it short but enough to \
         picture the conversation.\n\
         Include key entities (only if there are any) and at most 3 keywords that make \
         the context easy to retrieve.\n\
         If the message is empty, say that the speaker returned an empty response.\n\n\
         Message: {}",
        content
    )
}

/// Summaries come from the active provider only; a failure is labelled, not retried.
#[async_trait]
impl Summarizer for LLMRouter {
    async fn summarize(&self, content: &str) -> Result<String, LLMError> {
        let response = self
            .call_active(&[Message::user(summary_prompt(content))], &[])
            .await?;
        Ok(response.content.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Spawn a task per batch and return immediately
    Background,
    /// Archive before returning; deterministic, for tests
    Inline,
}

pub struct Archiver {
    store: Arc<dyn DurableStore>,
    summarizer: Option<Arc<dyn Summarizer>>,
    mode: ArchiveMode,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Archiver {
    pub fn new(
        store: Arc<dyn DurableStore>,
        summarizer: Option<Arc<dyn Summarizer>>,
        mode: ArchiveMode,
    ) -> Self {
        Self {
            store,
            summarizer,
            mode,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    /// Hand a batch over for archival.
    ///
    /// In background mode this only schedules the work.
    pub async fn archive(&self, batch: Vec<SessionMessage>) {
        if batch.is_empty() {
            return;
        }

        match self.mode {
            ArchiveMode::Inline => {
                archive_batch(Arc::clone(&self.store), self.summarizer.clone(), batch).await
            }
            ArchiveMode::Background => {
                let handle = tokio::spawn(archive_batch(
                    Arc::clone(&self.store),
                    self.summarizer.clone(),
                    batch,
                ));
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
        }
    }

    /// Wait for every scheduled archive task. Used at shutdown and in tests.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Archive task panicked: {}", e);
            }
        }
    }
}

async fn archive_batch(
    store: Arc<dyn DurableStore>,
    summarizer: Option<Arc<dyn Summarizer>>,
    mut batch: Vec<SessionMessage>,
) {
    if let Some(summarizer) = summarizer {
        for message in &mut batch {
            message.summary = Some(summarize_message(summarizer.as_ref(), &message.content).await);
        }
    }

    let documents = render_batch(&batch);
    let mut stored = 0;
    for document in &documents {
        match store.store(document, CHAT_LOGS).await {
            Ok(_) => stored += 1,
            Err(e) => tracing::error!("Failed to archive message: {}", e),
        }
    }
    tracing::debug!("Archived {}/{} document(s)", stored, documents.len());
}

async fn summarize_message(summarizer: &dyn Summarizer, content: &str) -> String {
    match summarizer.summarize(content).await {
        Ok(summary) => summary,
        Err(e) if e.is_rate_limit() => {
            tracing::warn!("Rate limit hit, archiving without summary");
            SUMMARY_RATE_LIMITED.to_string()
        }
        Err(e) => {
            tracing::warn!("Failed to generate summary: {}", e);
            SUMMARY_FAILED.to_string()
        }
    }
}

/// Render a batch into archive documents.
///
/// A user message directly followed by an agent message becomes one pair
/// `[timestamp, user_query, agent, agent_response, summary]`; every other
/// message is rendered alone as `[timestamp, role, content, summary]`.
pub fn render_batch(batch: &[SessionMessage]) -> Vec<String> {
    let mut documents = Vec::with_capacity(batch.len());
    let mut i = 0;

    while i < batch.len() {
        let message = &batch[i];
        let next = batch.get(i + 1);

        match next {
            Some(reply) if is_user_role(&message.role) && !is_user_role(&reply.role) => {
                let summary = message
                    .summary
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .or(reply.summary.as_deref())
                    .unwrap_or_default();
                let agent = if reply.role.trim().is_empty() {
                    DEFAULT_AGENT
                } else {
                    reply.role.as_str()
                };
                documents.push(format!(
                    "[{}, {}, {}, {}, {}]",
                    message.timestamp, message.content, agent, reply.content, summary
                ));
                i += 2;
            }
            _ => {
                documents.push(format!(
                    "[{}, {}, {}, {}]",
                    message.timestamp,
                    message.role,
                    message.content,
                    message.summary.as_deref().unwrap_or_default()
                ));
                i += 1;
            }
        }
    }

    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::errors::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        docs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DurableStore for MemoryStore {
        async fn store(&self, text: &str, _collection: &str) -> Result<String, EngineError> {
            self.docs.lock().unwrap().push(text.to_string());
            Ok("id".to_string())
        }

        async fn search(&self, _: &str, _: &str, _: usize) -> Result<Vec<String>, EngineError> {
            Ok(Vec::new())
        }

        async fn clear(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct FixedSummarizer {
        result: fn() -> Result<String, LLMError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _content: &str) -> Result<String, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn msg(role: &str, content: &str) -> SessionMessage {
        SessionMessage {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: "t".to_string(),
            summary: None,
        }
    }

    #[test]
    fn test_render_pairs_user_with_reply() {
        let mut user = msg("User", "clean it");
        user.summary = Some("cleaning request".to_string());
        let docs = render_batch(&[user, msg("Cleaner", "done"), msg("Watcher", "PASS")]);
        assert_eq!(
            docs,
            [
                "[t, clean it, Cleaner, done, cleaning request]",
                "[t, Watcher, PASS, ]"
            ]
        );
    }

    #[test]
    fn test_render_unpaired_user() {
        let docs = render_batch(&[msg("User", "a"), msg("user", "b")]);
        assert_eq!(docs, ["[t, User, a, ]", "[t, user, b, ]"]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_labelled() {
        let store = Arc::new(MemoryStore::default());
        let archiver = Archiver::new(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            Some(Arc::new(FixedSummarizer {
                result: || Err(LLMError::RateLimitExceeded),
                calls: AtomicUsize::new(0),
            })),
            ArchiveMode::Inline,
        );

        archiver.archive(vec![msg("Cleaner", "dropped nulls")]).await;
        let docs = store.docs.lock().unwrap();
        assert_eq!(docs[0], format!("[t, Cleaner, dropped nulls, {}]", SUMMARY_RATE_LIMITED));
    }

    #[tokio::test]
    async fn test_other_failures_are_labelled() {
        let store = Arc::new(MemoryStore::default());
        let archiver = Archiver::new(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            Some(Arc::new(FixedSummarizer {
                result: || Err(LLMError::Timeout),
                calls: AtomicUsize::new(0),
            })),
            ArchiveMode::Inline,
        );

        archiver.archive(vec![msg("Cleaner", "x")]).await;
        assert!(store.docs.lock().unwrap()[0].contains(SUMMARY_FAILED));
    }

    #[tokio::test]
    async fn test_background_drain_completes_writes() {
        let store = Arc::new(MemoryStore::default());
        let summarizer = Arc::new(FixedSummarizer {
            result: || Ok("summary".to_string()),
            calls: AtomicUsize::new(0),
        });
        let archiver = Archiver::new(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            Some(Arc::clone(&summarizer) as Arc<dyn Summarizer>),
            ArchiveMode::Background,
        );

        for i in 0..5 {
            archiver.archive(vec![msg("Trainer", &format!("r{}", i))]).await;
        }
        archiver.drain().await;

        let mut docs = store.docs.lock().unwrap().clone();
        docs.sort();
        assert_eq!(docs.len(), 5);
        assert_eq!(docs[0], "[t, Trainer, r0, summary]");
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 5);
    }
}
