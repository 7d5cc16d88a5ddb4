//! OpenAI-compatible chat completions provider.
//!
//! Groq, OpenRouter and Cerebras all expose `/chat/completions` with the
//! OpenAI wire format, so one provider type serves all three; only the
//! name, base URL and key differ.

use super::{LLMError, LLMProvider, LLMResponse, Message, MessageRole, ToolCall};
use crate::config::ProviderConfig;
use crate::secrets::SecretCache;
use async_trait::async_trait;
use sdk::tool::ToolSpec;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct OpenAICompatibleProvider {
    name: String,
    config: ProviderConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl OpenAICompatibleProvider {
    pub fn new(
        name: impl Into<String>,
        config: ProviderConfig,
        secret_cache: Arc<SecretCache>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }

    fn encode_message(msg: &Message) -> Value {
        match msg.role {
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
            }),
            MessageRole::Assistant if !msg.tool_calls.is_empty() => {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {"name": tc.name, "arguments": tc.arguments},
                        })
                    })
                    .collect();
                json!({
                    "role": "assistant",
                    "content": msg.content,
                    "tool_calls": calls,
                })
            }
            role => json!({
                "role": role.to_string(),
                "content": msg.content,
            }),
        }
    }

    fn decode_tool_calls(message: &Value) -> Vec<ToolCall> {
        let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) else {
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?;
                let arguments = match function.get("arguments") {
                    Some(Value::String(raw)) => raw.clone(),
                    Some(other) => other.to_string(),
                    None => "{}".to_string(),
                };
                let id = call
                    .get("id")
                    .and_then(|i| i.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
                Some(ToolCall::new(id, name, arguments))
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> super::Result<LLMResponse> {
        let api_key = self
            .secret_cache
            .get_secret(&self.config.api_key_env)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let api_messages: Vec<Value> = messages.iter().map(Self::encode_message).collect();

        let mut payload = json!({
            "model": model,
            "messages": api_messages,
        });

        if !tools.is_empty() {
            let api_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
            payload["tools"] = json!(api_tools);
            payload["tool_choice"] = json!("auto");
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(self.secret_cache.scrub(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = self
                .secret_cache
                .scrub(&response.text().await.unwrap_or_default());

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                400..=499 => {
                    let err = LLMError::InvalidRequest(text);
                    if err.is_tool_validation() {
                        LLMError::ToolValidation(err.to_string())
                    } else {
                        err
                    }
                }
                _ => LLMError::ProviderUnavailable(format!(
                    "{} API error ({}): {}",
                    self.name, status, text
                )),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let message = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| LLMError::ParseError("No message in response".to_string()))?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let tool_calls = Self::decode_tool_calls(message);
        if !tool_calls.is_empty() {
            return Ok(LLMResponse::with_tool_calls(content, tool_calls));
        }

        if content.is_empty() {
            return Err(LLMError::ParseError("Empty content".to_string()));
        }

        Ok(LLMResponse::from_text(content, !tools.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_assistant_tool_calls() {
        let msg = Message::assistant_tool_calls(
            "",
            vec![ToolCall::new("call_1", "python_interpreter", r#"{"code":"1"}"#)],
        );
        let encoded = OpenAICompatibleProvider::encode_message(&msg);
        assert_eq!(encoded["tool_calls"][0]["id"], "call_1");
        assert_eq!(encoded["tool_calls"][0]["function"]["name"], "python_interpreter");
    }

    #[test]
    fn test_encode_tool_result() {
        let encoded = OpenAICompatibleProvider::encode_message(&Message::tool_result("42", "call_1"));
        assert_eq!(encoded["role"], "tool");
        assert_eq!(encoded["tool_call_id"], "call_1");
    }

    #[test]
    fn test_decode_tool_calls_accepts_object_arguments() {
        let message = json!({
            "tool_calls": [
                {"id": "a", "function": {"name": "chat_log_search", "arguments": {"query": "x"}}},
                {"function": {"name": "install_package", "arguments": "{\"package\":\"lightgbm\"}"}}
            ]
        });
        let calls = OpenAICompatibleProvider::decode_tool_calls(&message);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, r#"{"query":"x"}"#);
        assert!(calls[1].id.starts_with("call_"));
    }
}
