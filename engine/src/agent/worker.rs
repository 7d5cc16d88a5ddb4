//! The worker loop.
//!
//! `run_task` records the task in the shared Warm session, rebuilds the chat
//! history from it, then alternates model calls and tool calls for at most
//! `max_tool_rounds` rounds. The final text is recorded under the worker's
//! name and returned.
//!
//! Business failures come back as text. The only errors are
//! [`EngineError::AllProvidersExhausted`] and [`EngineError::Interrupted`].

use super::{prompts, WorkerRole};
use crate::conductor::InterruptHandle;
use crate::config::Config;
use crate::llm::{LLMError, LLMResponse, LLMRouter, Message};
use crate::memory::hot::NO_CONTEXT;
use crate::memory::{is_user_role, HotMemory, SessionMessage, WarmMemory};
use crate::tools::ToolRegistry;
use sdk::errors::EngineError;
use sdk::tool::ToolSpec;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TRUNCATION_MARKER: &str = "... [TRUNCATED]";

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Warm messages replayed into every call
    pub history_limit: usize,
    /// Longer message contents are cut before replay
    pub max_message_chars: usize,
    pub max_tool_rounds: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            history_limit: 30,
            max_message_chars: 3000,
            max_tool_rounds: 5,
        }
    }
}

impl From<&Config> for WorkerSettings {
    fn from(config: &Config) -> Self {
        Self {
            history_limit: config.memory.history_limit,
            max_message_chars: config.memory.max_message_chars,
            max_tool_rounds: config.workflow.max_tool_rounds,
        }
    }
}

/// Cut `content` to `max_chars` characters, marking the cut
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

pub struct Worker {
    name: String,
    system_prompt: String,
    router: Arc<LLMRouter>,
    tools: ToolRegistry,
    memory: WarmMemory,
    settings: WorkerSettings,
    interrupt: Option<InterruptHandle>,
}

impl Worker {
    /// Build a worker whose prompt is `template` with the project context filled in.
    ///
    /// The context is a snapshot; a later Hot tier change needs a new worker.
    pub fn new(
        name: impl Into<String>,
        template: &str,
        project_context: &str,
        router: Arc<LLMRouter>,
        tools: ToolRegistry,
        memory: WarmMemory,
        settings: WorkerSettings,
    ) -> Self {
        let name = name.into();
        if project_context.contains(NO_CONTEXT) {
            warn!("[{}] No project context found in hot memory", name);
        }

        Self {
            system_prompt: prompts::render(template, project_context),
            name,
            router,
            tools,
            memory,
            settings,
            interrupt: None,
        }
    }

    /// Build the worker for `role`, binding its subset of `tools`
    pub fn for_role(
        role: WorkerRole,
        hot: &HotMemory,
        router: Arc<LLMRouter>,
        tools: &ToolRegistry,
        memory: WarmMemory,
        settings: WorkerSettings,
    ) -> Self {
        Self::new(
            role.name(),
            role.template(),
            &hot.get_context(),
            router,
            tools.subset(role.tool_names()),
            memory,
            settings,
        )
    }

    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    pub fn memory(&self) -> &WarmMemory {
        &self.memory
    }

    /// Text returned when the model calls a tool that is not bound
    fn tool_fallback_text(&self) -> String {
        format!(
            "I encountered a tool error. The requested tool is not available. Please use only: {}.",
            self.tools.names().join(", ")
        )
    }

    /// System prompt followed by the recent Warm window
    pub async fn build_history(&self) -> Vec<Message> {
        let recent = self
            .memory
            .get_recent_messages(self.settings.history_limit)
            .await;

        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(
            recent
                .iter()
                .map(|m| history_message(m, self.settings.max_message_chars)),
        );
        messages
    }

    /// Run one task to completion
    pub async fn run_task(&self, task: &str) -> Result<String, EngineError> {
        let work = self.execute(task);
        match &self.interrupt {
            Some(interrupt) => tokio::select! {
                result = work => result,
                _ = interrupt.cancelled() => {
                    warn!("[{}] Task interrupted", self.name);
                    Err(EngineError::Interrupted)
                }
            },
            None => work.await,
        }
    }

    async fn execute(&self, task: &str) -> Result<String, EngineError> {
        info!("[{}] Received task: {}", self.name, task);
        self.memory.add_message("User", task).await;

        let mut messages = self.build_history().await;
        let specs = self.tools.specs();

        let mut response = self.invoke(&messages, &specs).await?;
        let mut rounds = 0;

        while response.has_tool_calls() && rounds < self.settings.max_tool_rounds {
            rounds += 1;
            debug!(
                "[{}] Tool round {}/{}",
                self.name, rounds, self.settings.max_tool_rounds
            );

            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                info!("[{}] Executing: {}", self.name, call.name);
                let output = self.tools.dispatch(&call.name, &call.arguments).await;
                messages.push(Message::tool_result(output, &call.id));
            }

            response = self.invoke(&messages, &specs).await?;
        }

        if response.has_tool_calls() {
            warn!(
                "[{}] Stopped after {} tool rounds",
                self.name, self.settings.max_tool_rounds
            );
        }

        let text = response.content.trim().to_string();
        self.memory.add_message(&self.name, &text).await;
        info!(
            "[{}] Finished: {}",
            self.name,
            text.chars().take(100).collect::<String>()
        );
        Ok(text)
    }

    async fn invoke(
        &self,
        messages: &[Message],
        specs: &[ToolSpec],
    ) -> Result<LLMResponse, EngineError> {
        match self.router.call(messages, specs).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_tool_validation() => {
                warn!("[{}] Model called an unavailable tool: {}", self.name, e);
                Ok(LLMResponse::final_answer(self.tool_fallback_text()))
            }
            Err(LLMError::AllProvidersExhausted) => Err(EngineError::AllProvidersExhausted),
            Err(e) => Err(EngineError::LLMProvider(e.to_string())),
        }
    }
}

/// User entries are human turns; every other role is a labelled assistant turn
fn history_message(message: &SessionMessage, max_chars: usize) -> Message {
    let content = truncate_content(&message.content, max_chars);
    if is_user_role(&message.role) {
        Message::user(content)
    } else {
        Message::assistant(format!("[{}]: {}", message.role, content))
    }
}
