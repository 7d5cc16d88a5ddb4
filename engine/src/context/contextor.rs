//! Contextor: interviews the user about a dataset and produces the project
//! context every worker prompt is built from.
//!
//! The interview runs on its own Warm session, `setup_<dataset name>`, which
//! is cleared at the start so a retry begins from scratch.

use super::profiler::Profiler;
use super::prompter::Prompter;
use crate::agent::prompts;
use crate::llm::{LLMError, LLMRouter, Message};
use crate::memory::{DurableStore, HotMemory, SessionMessage, WarmMemory};
use sdk::errors::EngineError;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const FIRST_MESSAGE: &str = "Please begin the conversation by asking your first question.";
pub const DONE_MARKER: &str = "DONE";
pub const ROLE: &str = "Contextor";

/// Warm messages replayed into each interview call
const HISTORY_LIMIT: usize = 20;

/// Warm session id for the interview about `source`
pub fn setup_session_id(source: &str) -> String {
    let name = Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string());
    format!("setup_{}", name.replace(' ', "_"))
}

pub struct Contextor {
    router: Arc<LLMRouter>,
    profiler: Arc<dyn Profiler>,
    hot: Arc<HotMemory>,
    memory: WarmMemory,
    store: Arc<dyn DurableStore>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Contextor {
    /// `memory` is any handle on the Warm backend; the interview rebinds it
    pub fn new(
        router: Arc<LLMRouter>,
        profiler: Arc<dyn Profiler>,
        hot: Arc<HotMemory>,
        memory: WarmMemory,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            router,
            profiler,
            hot,
            memory,
            store,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Run the interview.
    ///
    /// Returns the final context, or `None` when the user ended the
    /// interview before it finished.
    pub async fn run(&self, prompter: &dyn Prompter) -> Result<Option<String>, EngineError> {
        let Some(source) = prompter
            .ask("Enter dataset file/folder path or database connection string: ")
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?
        else {
            return Ok(None);
        };
        let source = source.trim().to_string();

        if !source.contains("://") && !Path::new(&source).exists() {
            return Err(EngineError::Profiler(format!("File not found: {}", source)));
        }

        let session = self.memory.for_session(setup_session_id(&source));
        session.clear_session().await;

        prompter.say("\n📊 Collecting Context...\n");
        let summary = self.profiler.summarize(&source).await?;
        prompter.say("✅ Dataset analyzed successfully.\n");

        session.save_metadata("dataset_path", json!(source)).await;
        self.spawn_summary_refinement(summary.clone(), source.clone());

        let system_prompt = prompts::contextor(&source, &summary);
        prompter.say("🤖 Contextor is preparing a few questions. They help the agents understand the project.\n");

        session.add_message("user", FIRST_MESSAGE).await;
        let first = self.reply(&system_prompt, &session).await?;
        session.add_message(ROLE, &first).await;
        prompter.say(&format!("AI: {}\n", first));

        loop {
            let input = prompter
                .ask("You: ")
                .await
                .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?;
            let input = match input {
                Some(line) if !matches!(line.trim().to_lowercase().as_str(), "exit" | "quit") => line,
                _ => {
                    prompter.say("Chat ended manually.");
                    return Ok(None);
                }
            };

            session.add_message("User", &input).await;
            let reply = self.reply(&system_prompt, &session).await?;
            session.add_message(ROLE, &reply).await;
            prompter.say(&format!("\nAI: {}\n", reply));

            if reply.contains(DONE_MARKER) {
                let context = reply.replace(DONE_MARKER, "").trim().to_string();
                prompter.say("✅ Context generation completed.\n");

                self.hot.set_context(context.clone());
                prompter.say("🔥 Global Context (Hot Memory) updated!");

                match self
                    .store
                    .update_context(&context, "Context", &source, ROLE)
                    .await
                {
                    Ok(_) => prompter.say("🧊 Persistent Context (Cold Memory) saved!"),
                    Err(e) => error!("Failed to store project context: {}", e),
                }
                return Ok(Some(context));
            }
        }
    }

    /// Wait for background summary refinement
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Summary refinement panicked: {}", e);
            }
        }
    }

    async fn reply(&self, system_prompt: &str, session: &WarmMemory) -> Result<String, EngineError> {
        let recent = session.get_recent_messages(HISTORY_LIMIT).await;
        let mut messages = vec![Message::system(system_prompt)];
        messages.extend(recent.iter().filter_map(interview_message));

        let response = self.router.call(&messages, &[]).await.map_err(|e| match e {
            LLMError::AllProvidersExhausted => EngineError::AllProvidersExhausted,
            other => EngineError::LLMProvider(other.to_string()),
        })?;
        Ok(response.content.trim().to_string())
    }

    fn spawn_summary_refinement(&self, raw: String, dataset: String) {
        let router = Arc::clone(&self.router);
        let store = Arc::clone(&self.store);

        let handle = tokio::spawn(async move {
            let messages = vec![
                Message::system(prompts::SUMMARY_REFINER),
                Message::user(format!("Here is the raw summary:\n\n{}", raw)),
            ];
            let refined = match router.call(&messages, &[]).await {
                Ok(response) => response.content.trim().to_string(),
                Err(e) => {
                    warn!("Summary refinement failed: {}", e);
                    return;
                }
            };
            match store
                .update_context(&refined, "Data_summary", &dataset, ROLE)
                .await
            {
                Ok(_) => info!("Data summary saved for {}", dataset),
                Err(e) => error!("Failed to store data summary: {}", e),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

/// Interview turns: the user's and Contextor's; anything else is skipped
fn interview_message(message: &SessionMessage) -> Option<Message> {
    match message.role.trim().to_lowercase().as_str() {
        "user" => Some(Message::user(&message.content)),
        "contextor" | "ai" | "assistant" => Some(Message::assistant(&message.content)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LLMConfig;
    use crate::context::prompter::ScriptedPrompter;
    use crate::db::Database;
    use crate::llm::{LLMProvider, LLMResponse, RuntimeConfig};
    use crate::memory::warm::SqliteWarmBackend;
    use crate::memory::{ArchiveMode, Archiver, SqliteFtsStore, CONTEXT_STORE};
    use async_trait::async_trait;
    use sdk::tool::ToolSpec;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct FixedProfiler;

    #[async_trait]
    impl Profiler for FixedProfiler {
        async fn summarize(&self, _source: &str) -> Result<String, EngineError> {
            Ok("## Table Summary\n- Rows: 3".to_string())
        }
    }

    /// Interview replies in order; refinement requests get a fixed answer
    struct Interviewer {
        replies: std::sync::Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl LLMProvider for Interviewer {
        fn name(&self) -> &str {
            "groq"
        }

        async fn generate(
            &self,
            _model: &str,
            messages: &[Message],
            _tools: &[ToolSpec],
        ) -> crate::llm::Result<LLMResponse> {
            if messages[0].content == prompts::SUMMARY_REFINER {
                return Ok(LLMResponse::final_answer("refined summary"));
            }
            let next = self.replies.lock().unwrap().pop_front().unwrap_or("DONE");
            Ok(LLMResponse::final_answer(next))
        }
    }

    struct Fixture {
        contextor: Contextor,
        hot: Arc<HotMemory>,
        store: Arc<SqliteFtsStore>,
        memory: WarmMemory,
        dir: TempDir,
    }

    async fn fixture(replies: Vec<&'static str>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = Database::in_memory().await.unwrap();
        let store = Arc::new(SqliteFtsStore::new(db.clone()));
        let archiver = Arc::new(Archiver::new(store.clone(), None, ArchiveMode::Inline));
        let memory = WarmMemory::new(
            "shared_session_v1",
            Arc::new(SqliteWarmBackend::new(db)),
            archiver,
            20,
            1,
        );
        let hot = Arc::new(HotMemory::load(dir.path().join("hot.json")));
        let router = Arc::new(LLMRouter::new(
            vec![Box::new(Interviewer {
                replies: std::sync::Mutex::new(replies.into()),
            })],
            Arc::new(RuntimeConfig::from_config(&LLMConfig::default())),
        ));
        let contextor = Contextor::new(
            router,
            Arc::new(FixedProfiler),
            Arc::clone(&hot),
            memory.clone(),
            store.clone(),
        );
        Fixture {
            contextor,
            hot,
            store,
            memory,
            dir,
        }
    }

    #[test]
    fn test_setup_session_id() {
        assert_eq!(setup_session_id("/data/q1 sales.csv"), "setup_q1_sales.csv");
        assert_eq!(setup_session_id("data"), "setup_data");
    }

    #[tokio::test]
    async fn test_interview_sets_hot_context() {
        let f = fixture(vec!["What is the goal?", "Context:\nForecast revenue.\nDONE"]).await;
        let dataset = f.dir.path().join("sales data.csv");
        std::fs::write(&dataset, "a\n1\n").unwrap();
        let prompter = ScriptedPrompter::new([dataset.to_str().unwrap(), "forecast revenue"]);

        let context = f.contextor.run(&prompter).await.unwrap();
        f.contextor.drain().await;

        assert_eq!(context.as_deref(), Some("Context:\nForecast revenue."));
        assert_eq!(f.hot.get_context(), "Context:\nForecast revenue.");
        assert_eq!(f.store.count(CONTEXT_STORE).await.unwrap(), 2);

        let setup = f.memory.for_session("setup_sales_data.csv");
        assert_eq!(
            setup.get_metadata("dataset_path").await,
            Some(json!(dataset.to_str().unwrap()))
        );
        let roles: Vec<String> = setup
            .get_recent_messages(10)
            .await
            .into_iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec!["user", "Contextor", "User", "Contextor"]);
    }

    #[tokio::test]
    async fn test_exit_leaves_context_unset() {
        let f = fixture(vec!["What is the goal?"]).await;
        let dataset = f.dir.path().join("a.csv");
        std::fs::write(&dataset, "a\n1\n").unwrap();
        let prompter = ScriptedPrompter::new([dataset.to_str().unwrap(), "quit"]);

        assert_eq!(f.contextor.run(&prompter).await.unwrap(), None);
        assert!(f.hot.is_empty());
        assert!(prompter.shown().contains(&"Chat ended manually.".to_string()));
    }

    #[tokio::test]
    async fn test_missing_dataset_is_an_error() {
        let f = fixture(vec![]).await;
        let prompter = ScriptedPrompter::new(["/definitely/not/here.csv"]);
        let err = f.contextor.run(&prompter).await.unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
