use super::{LLMError, LLMProvider, LLMResponse, Message, MessageRole, ToolCall};
use crate::config::ProviderConfig;
use crate::secrets::SecretCache;
use async_trait::async_trait;
use sdk::tool::ToolSpec;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct GeminiProvider {
    config: ProviderConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }

    /// Gemini's `contents` plus the optional system instruction.
    ///
    /// Prior tool calls and tool results are replayed as text turns, since a
    /// `functionResponse` part needs the function name, which tool result
    /// messages do not carry.
    fn encode_contents(messages: &[Message]) -> (Vec<Value>, Option<Value>) {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => system_parts.push(json!({"text": msg.content})),
                MessageRole::Assistant => {
                    let mut text = msg.content.clone();
                    for tc in &msg.tool_calls {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(&format!(
                            r#"{{"function": "{}", "arguments": {}}}"#,
                            tc.name, tc.arguments
                        ));
                    }
                    contents.push(json!({"role": "model", "parts": [{"text": text}]}));
                }
                MessageRole::Tool => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": format!(
                        "Tool result ({}):\n{}",
                        msg.tool_call_id.as_deref().unwrap_or("call"),
                        msg.content
                    )}]
                })),
                MessageRole::User => {
                    contents.push(json!({"role": "user", "parts": [{"text": msg.content}]}))
                }
            }
        }

        let system = (!system_parts.is_empty()).then(|| json!({"parts": system_parts}));
        (contents, system)
    }

    fn decode_parts(parts: &[Value]) -> (String, Vec<ToolCall>) {
        let mut full_text = String::new();
        let mut calls = Vec::new();

        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                full_text.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                if let Some(name) = call.get("name").and_then(|n| n.as_str()) {
                    let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                    calls.push(ToolCall::new(
                        format!("call_{}", uuid::Uuid::new_v4()),
                        name,
                        args.to_string(),
                    ));
                }
            }
        }

        (full_text, calls)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let (contents, system_instruction) = Self::encode_contents(messages);

        let mut payload = serde_json::Map::new();
        payload.insert("contents".to_string(), json!(contents));

        if let Some(sys) = system_instruction {
            payload.insert("systemInstruction".to_string(), sys);
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            payload.insert(
                "tools".to_string(),
                json!([{"functionDeclarations": declarations}]),
            );
        }

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key.expose())
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
                400 | 404 => LLMError::InvalidRequest(text),
                429 => LLMError::RateLimitExceeded,
                401 | 403 => LLMError::AuthenticationFailed(text),
                _ => LLMError::ProviderUnavailable(format!(
                    "Gemini API error ({}): {}",
                    status, text
                )),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let parts = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| LLMError::ParseError("No parts in candidate content".to_string()))?;

        let (full_text, calls) = Self::decode_parts(parts);
        if !calls.is_empty() {
            return Ok(LLMResponse::with_tool_calls(full_text, calls));
        }

        Ok(LLMResponse::from_text(full_text, !tools.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_become_instruction() {
        let (contents, system) = GeminiProvider::encode_contents(&[
            Message::system("You are the Cleaner"),
            Message::user("drop duplicates"),
            Message::assistant("[Watcher]: PASS"),
        ]);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            system.unwrap()["parts"][0]["text"],
            "You are the Cleaner"
        );
    }

    #[test]
    fn test_decode_function_call_part() {
        let parts = vec![
            json!({"text": "Running code"}),
            json!({"functionCall": {"name": "python_interpreter", "args": {"code": "df.head()"}}}),
        ];
        let (text, calls) = GeminiProvider::decode_parts(&parts);
        assert_eq!(text, "Running code");
        assert_eq!(calls[0].name, "python_interpreter");
        assert_eq!(calls[0].arguments, r#"{"code":"df.head()"}"#);
    }
}
