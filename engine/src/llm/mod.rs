//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the chat-completion providers the
//! workers talk to (Groq, OpenRouter and Cerebras through the OpenAI-compatible
//! API, and Gemini). The LLMProvider trait defines the contract every provider
//! implements, enabling the LLM router to fall back between providers transparently.

use async_trait::async_trait;
use sdk::tool::ToolSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gemini;
pub mod openai;
pub mod router;
pub mod runtime;
pub mod structured;

pub use router::LLMRouter;
pub use runtime::{ActiveModel, RuntimeConfig};

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The model called a tool that was not bound to the request
    #[error("Tool call validation failed: {0}")]
    ToolValidation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("All LLM providers failed")]
    AllProvidersExhausted,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

const TOOL_VALIDATION_MARKERS: &[&str] = &["tool call validation failed", "not in request.tools"];

impl LLMError {
    /// True for quota and throttling failures, including ones only reported in text
    pub fn is_rate_limit(&self) -> bool {
        match self {
            LLMError::RateLimitExceeded => true,
            other => {
                let text = other.to_string().to_lowercase();
                text.contains("rate_limit") || text.contains("rate limit") || text.contains("429")
            }
        }
    }

    /// True when the provider rejected a call to a tool that was not bound
    pub fn is_tool_validation(&self) -> bool {
        match self {
            LLMError::ToolValidation(_) => true,
            LLMError::InvalidRequest(body) => {
                let body = body.to_lowercase();
                TOOL_VALIDATION_MARKERS.iter().any(|m| body.contains(m))
            }
            _ => false,
        }
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,

    /// Tool call ID for tool result messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Create an assistant message that carries the tool calls of a response
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    /// Create a new tool result message
    pub fn tool_result(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Tool call request from the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool (JSON string)
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Response from an LLM provider: text plus zero or more tool calls
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LLMResponse {
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl LLMResponse {
    /// A plain text answer
    pub fn final_answer(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A response requesting tool calls
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    /// Build a response from provider text, recognising textual tool calls
    /// only when tools were bound to the request.
    pub fn from_text(content: impl Into<String>, tools_bound: bool) -> Self {
        let content = content.into();
        if tools_bound {
            if let Some(call) = parse_tool_calls(&content) {
                return Self::with_tool_calls(content, vec![call]);
            }
        }
        Self::final_answer(content)
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "groq", "gemini")
    fn name(&self) -> &str;

    /// Generate a response from the LLM
    ///
    /// # Arguments
    /// * `model` - Model identifier on this provider
    /// * `messages` - Conversation history including system prompt and tool results
    /// * `tools` - Tools bound to this request; empty for plain chat
    async fn generate(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<LLMResponse>;
}

/// Helper function to parse tool calls from string content.
///
/// Handles multiple LLM output formats:
/// 1. Raw JSON: `{"function": "...", "arguments": {...}}`
/// 2. Fenced JSON (with or without trailing text)
/// 3. `<tool_call>{"name": "...", "arguments": {...}}</tool_call>` markers
/// 4. JSON embedded in prose, found by scanning for `{"function":`
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    if let Some(start) = trimmed.find("<tool_call>") {
        let body = &trimmed[start + "<tool_call>".len()..];
        let body = body.find("</tool_call>").map(|end| &body[..end]).unwrap_or(body);
        if let Some(tc) = try_parse_function_json(body.trim()) {
            return Some(tc);
        }
    }

    if let Some(pos) = trimmed.find("{\"function\"") {
        if let Some(json_str) = extract_balanced_json(&trimmed[pos..]) {
            if let Some(tc) = try_parse_function_json(json_str) {
                return Some(tc);
            }
        }
    }

    None
}

/// Parse `{"function"|"name": "...", "arguments": {...}}` as a tool call.
fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json
        .get("function")
        .or_else(|| json.get("name"))?
        .as_str()?;
    let arguments = match json.get("arguments")? {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    Some(ToolCall::new(
        format!("call_{}", uuid::Uuid::new_v4()),
        function,
        arguments,
    ))
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing fence.
pub(crate) fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
pub(crate) fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
