//! Router node: turns the request and execution history into task assignments.

use super::state::{TaskPlan, WatcherStatus, WorkflowState};
use crate::agent::prompts;
use crate::llm::structured::parse_structured;
use crate::llm::{LLMError, LLMRouter, Message};
use sdk::errors::EngineError;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_CHAT_RESPONSE: &str = "✅ Task delegated or completed.";

#[derive(Debug, Clone, PartialEq)]
pub struct RouterDecision {
    pub chat_response: String,
    pub plan: TaskPlan,
}

/// A task value counts only when it is a non-empty string other than "null"/"none"
fn task_value(map: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match map.get(key)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    let lowered = text.to_lowercase();
    if text.is_empty() || lowered == "null" || lowered == "none" {
        None
    } else {
        Some(text)
    }
}

/// Interpret the Router's reply.
///
/// Unrepairable output assigns no tasks and is shown to the user as is;
/// so is an object with neither a reply nor a task.
pub fn parse_decision(text: &str) -> RouterDecision {
    let map = match parse_structured(text) {
        Ok(map) => map,
        Err(e) => {
            warn!("Router output is not JSON even after repair: {}", e);
            return RouterDecision {
                chat_response: text.trim().to_string(),
                plan: TaskPlan::default(),
            };
        }
    };

    let plan = TaskPlan {
        cleaner_task: task_value(&map, "cleaner_task"),
        fe_task: task_value(&map, "fe_task"),
        viz_task: task_value(&map, "viz_task"),
        trainer_task: task_value(&map, "trainer_task"),
    };

    let chat_response = match map.get("chat_response").and_then(Value::as_str) {
        Some(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        _ if plan.is_empty() => text.trim().to_string(),
        _ => DEFAULT_CHAT_RESPONSE.to_string(),
    };

    RouterDecision {
        chat_response,
        plan,
    }
}

pub struct Planner {
    router: Arc<LLMRouter>,
}

impl Planner {
    pub fn new(router: Arc<LLMRouter>) -> Self {
        Self { router }
    }

    /// Messages sent to the model for the current state
    pub async fn build_messages(&self, state: &WorkflowState) -> Vec<Message> {
        let mut system = prompts::ROUTER.to_string();
        if state.watcher_status == WatcherStatus::Fail {
            let failed = state.last_agent.as_deref().unwrap_or("unknown");
            warn!(
                "Router must address FAIL for {}: {}",
                failed, state.watcher_feedback
            );
            system.push_str(&prompts::router_fail_context(failed, &state.watcher_feedback));
        }
        system.push_str(prompts::ROUTER_JSON_REMINDER);

        let history = state.messages.render().await;
        vec![
            Message::system(system),
            Message::user(format!(
                "Request: {}\n\nExisting Execution History:\n{}",
                state.user_request, history
            )),
        ]
    }

    pub async fn decide(&self, state: &WorkflowState) -> Result<RouterDecision, EngineError> {
        info!("Router analyzing request");
        let messages = self.build_messages(state).await;

        let response = self.router.call(&messages, &[]).await.map_err(|e| match e {
            LLMError::AllProvidersExhausted => EngineError::AllProvidersExhausted,
            other => EngineError::LLMProvider(other.to_string()),
        })?;

        let decision = parse_decision(&response.content);
        info!("Router says: {}", decision.chat_response);
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_decision() {
        let decision = parse_decision(
            "Sure.\n```json\n{\"chat_response\": \"On it\", \"cleaner_task\": \"drop nulls\", \
             \"fe_task\": null, \"viz_task\": \"None\", \"trainer_task\": \"\"}\n```",
        );
        assert_eq!(decision.chat_response, "On it");
        assert_eq!(decision.plan.cleaner_task.as_deref(), Some("drop nulls"));
        assert_eq!(decision.plan.fe_task, None);
        assert_eq!(decision.plan.viz_task, None);
        assert_eq!(decision.plan.trainer_task, None);
    }

    #[test]
    fn test_missing_chat_response_uses_default() {
        let decision = parse_decision(r#"{"viz_task": "plot revenue"}"#);
        assert_eq!(decision.chat_response, DEFAULT_CHAT_RESPONSE);
        assert_eq!(decision.plan.viz_task.as_deref(), Some("plot revenue"));
    }

    #[test]
    fn test_object_without_reply_or_tasks_shows_raw_text() {
        let raw = r#"{"thoughts": "the user just said hello"}"#;
        let decision = parse_decision(raw);
        assert!(decision.plan.is_empty());
        assert_eq!(decision.chat_response, raw);
    }

    #[test]
    fn test_prose_reply_assigns_nothing() {
        let decision = parse_decision("I'm the Router. How can I help?");
        assert!(decision.plan.is_empty());
        assert_eq!(decision.chat_response, "I'm the Router. How can I help?");
    }

    #[test]
    fn test_repairs_python_style_dict() {
        let decision =
            parse_decision("{'chat_response': 'ok', 'cleaner_task': 'fix types', 'fe_task': None,}");
        assert_eq!(decision.plan.cleaner_task.as_deref(), Some("fix types"));
        assert_eq!(decision.plan.fe_task, None);
    }
}
