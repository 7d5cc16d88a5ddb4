//! Process-wide provider selection.
//!
//! [`RuntimeConfig`] holds the provider/model pair every LLM call resolves at
//! call time. It is shared by reference (`Arc<RuntimeConfig>`) between the
//! router, the workers and the interactive session, so a `/switch` command or
//! a provider fallback changes the active provider for all subsequent calls.

use crate::config::LLMConfig;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::RwLock;

/// Provider/model pair used for the next LLM call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveModel {
    pub provider: String,
    pub model: String,
}

impl ActiveModel {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for ActiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

pub struct RuntimeConfig {
    active: RwLock<ActiveModel>,
    default_models: HashMap<String, String>,
    fallback_order: Vec<String>,
}

impl RuntimeConfig {
    pub fn new(
        active: ActiveModel,
        default_models: HashMap<String, String>,
        fallback_order: Vec<String>,
    ) -> Self {
        Self {
            active: RwLock::new(active),
            default_models,
            fallback_order,
        }
    }

    /// Build from the `[llm]` config section
    pub fn from_config(llm: &LLMConfig) -> Self {
        let default_models: HashMap<String, String> = crate::config::KNOWN_PROVIDERS
            .iter()
            .filter_map(|name| {
                llm.provider(name)
                    .map(|p| (name.to_string(), p.model.clone()))
            })
            .collect();

        let model = llm
            .default_model
            .clone()
            .or_else(|| default_models.get(&llm.default_provider).cloned())
            .unwrap_or_default();

        Self::new(
            ActiveModel::new(llm.default_provider.clone(), model),
            default_models,
            llm.fallback_order.clone(),
        )
    }

    /// Snapshot of the active provider/model
    pub fn active(&self) -> ActiveModel {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn fallback_order(&self) -> &[String] {
        &self.fallback_order
    }

    pub fn default_model(&self, provider: &str) -> Option<&str> {
        self.default_models.get(provider).map(String::as_str)
    }

    /// Change the active provider for every subsequent call.
    ///
    /// Without an explicit model the provider's configured default model is used.
    pub fn switch_provider(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Result<ActiveModel, EngineError> {
        let provider = provider.trim().to_lowercase();
        let default_model = self
            .default_models
            .get(&provider)
            .ok_or_else(|| EngineError::UnknownProvider(provider.clone()))?;

        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .unwrap_or_else(|| default_model.clone());

        let next = ActiveModel::new(provider, model);
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = next.clone();
        tracing::info!("Active LLM set to {}", next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> RuntimeConfig {
        RuntimeConfig::from_config(&LLMConfig::default())
    }

    #[test]
    fn test_starts_on_configured_default() {
        let rt = runtime();
        assert_eq!(rt.active(), ActiveModel::new("groq", "qwen/qwen3-32b"));
        assert_eq!(rt.fallback_order(), ["gemini", "groq", "openrouter"]);
    }

    #[test]
    fn test_switch_uses_provider_default_model() {
        let rt = runtime();
        let active = rt.switch_provider("Gemini", None).unwrap();
        assert_eq!(active, ActiveModel::new("gemini", "gemini-2.5-flash"));
        assert_eq!(rt.active(), active);
    }

    #[test]
    fn test_switch_with_explicit_model() {
        let rt = runtime();
        rt.switch_provider("openrouter", Some("qwen/qwen3-coder")).unwrap();
        assert_eq!(rt.active().model, "qwen/qwen3-coder");
    }

    #[test]
    fn test_unknown_provider_leaves_active_untouched() {
        let rt = runtime();
        let err = rt.switch_provider("anthropic", None).unwrap_err();
        assert!(matches!(err, EngineError::UnknownProvider(_)));
        assert_eq!(rt.active().provider, "groq");
    }
}
