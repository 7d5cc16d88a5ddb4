//! LLM Router
//!
//! Resolves the active provider from [`RuntimeConfig`] and calls it. When the
//! active provider fails, [`LLMRouter::call`] walks the fixed fallback order,
//! switching the process-wide active provider before each attempt, so that
//! once a fallback succeeds every later call goes straight to it.
//!
//! A tool-validation rejection is not a provider failure: it is returned to
//! the caller without fallback, since another provider would see the same
//! out-of-set tool call.

use super::{ActiveModel, LLMError, LLMProvider, LLMResponse, Message, RuntimeConfig};
use sdk::tool::ToolSpec;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for one provider request
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct LLMRouter {
    /// Providers that have credentials, keyed by their `name()`
    providers: Vec<Box<dyn LLMProvider>>,

    /// Shared active-provider state
    runtime: Arc<RuntimeConfig>,

    timeout: Duration,
}

impl LLMRouter {
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, runtime: Arc<RuntimeConfig>) -> Self {
        Self {
            providers,
            runtime,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn runtime(&self) -> &Arc<RuntimeConfig> {
        &self.runtime
    }

    fn provider(&self, name: &str) -> Option<&dyn LLMProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|b| b.as_ref())
    }

    async fn attempt(
        &self,
        active: &ActiveModel,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> super::Result<LLMResponse> {
        let provider = self.provider(&active.provider).ok_or_else(|| {
            LLMError::ProviderUnavailable(format!(
                "Provider '{}' is not configured (missing API key?)",
                active.provider
            ))
        })?;

        tracing::debug!(
            "Attempting provider: {} (timeout: {}s)",
            active,
            self.timeout.as_secs()
        );

        match tokio::time::timeout(
            self.timeout,
            provider.generate(&active.model, messages, tools),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout),
        }
    }

    /// Call the active provider only, without fallback.
    ///
    /// Used for best-effort work such as archive summaries, where a failure
    /// is labelled rather than retried elsewhere.
    pub async fn call_active(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> super::Result<LLMResponse> {
        let active = self.runtime.active();
        self.attempt(&active, messages, tools).await
    }

    /// Call LLM providers with automatic failover
    ///
    /// 1. Try the active provider
    /// 2. On failure, switch to each untried provider of the fallback order and retry
    /// 3. Return `AllProvidersExhausted` if all fail
    pub async fn call(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> super::Result<LLMResponse> {
        let active = self.runtime.active();
        match self.attempt(&active, messages, tools).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_tool_validation() => return Err(e),
            Err(e) => tracing::warn!("Provider {} failed: {}", active, e),
        }

        let mut tried = vec![active.provider];
        for name in self.runtime.fallback_order() {
            if tried.contains(name) {
                continue;
            }
            tried.push(name.clone());

            if self.provider(name).is_none() {
                tracing::debug!("Skipping fallback provider {}: not configured", name);
                continue;
            }

            let switched = match self.runtime.switch_provider(name, None) {
                Ok(switched) => switched,
                Err(e) => {
                    tracing::warn!("Cannot switch to {}: {}", name, e);
                    continue;
                }
            };
            tracing::warn!("Falling back to provider {}", switched);

            match self.attempt(&switched, messages, tools).await {
                Ok(response) => {
                    tracing::info!("Provider {} succeeded", switched);
                    return Ok(response);
                }
                Err(e) if e.is_tool_validation() => return Err(e),
                Err(e) => tracing::warn!("Provider {} failed: {}", switched, e),
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(LLMError::AllProvidersExhausted)
    }
}
