//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: the interactive session (context building, then the request loop)
//! - graph: print the workflow graph
//! - memory dump / memory clear: inspect and reset the memory tiers
//! - key: store a provider API key in the OS keychain

use anyhow::{Context, Result};
use sdk::errors::{AnalystErrorExt, EngineError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::WorkerSettings;
use crate::cli::Tier;
use crate::conductor::{
    render_graph, Crew, InterruptHandle, Orchestrator, Planner, WorkflowLimits, WorkflowOutcome,
};
use crate::config::{Config, KNOWN_PROVIDERS};
use crate::context::{Contextor, Prompter, PythonProfiler, TerminalPrompter};
use crate::db::Database;
use crate::llm::gemini::GeminiProvider;
use crate::llm::openai::OpenAICompatibleProvider;
use crate::llm::{LLMProvider, LLMRouter, RuntimeConfig};
use crate::memory::warm::select_backend;
use crate::memory::{
    ArchiveMode, Archiver, DurableStore, HotMemory, SqliteFtsStore, UnavailableStore, WarmMemory,
};
use crate::secrets::{SecretCache, SecretManager};
use crate::tools::{
    AutoApprove, ChatLogSearchTool, InstallApproval, InstallPackageTool, PythonInterpreterTool,
    TerminalApproval, ToolRegistry,
};

/// Keychain service name for provider keys
pub const KEYCHAIN_SERVICE: &str = "analyst";

/// Characters of the stored context shown at startup
const PREVIEW_CHARS: usize = 300;

pub const RESET_NOTICE: &str =
    "✅ Context cleared. Please restart the application to re-run Contextor.";

/// One line typed at the session prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Quit,
    Graph,
    Switch {
        provider: String,
        model: Option<String>,
    },
    Reset,
    Empty,
    Request(String),
}

impl SessionCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => return Self::Empty,
            "q" | "exit" | "quit" => return Self::Quit,
            "graph" => return Self::Graph,
            "/reset" => return Self::Reset,
            _ => {}
        }

        let mut words = line.split_whitespace();
        if words.next() == Some("/switch") {
            if let Some(provider) = words.next() {
                return Self::Switch {
                    provider: provider.to_string(),
                    model: words.next().map(String::from),
                };
            }
        }
        Self::Request(line.to_string())
    }
}

/// First `max_chars` characters, with an ellipsis when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Providers with a resolvable API key, in the fixed provider order
pub fn build_providers(config: &Config, secrets: &Arc<SecretCache>) -> Vec<Box<dyn LLMProvider>> {
    let mut providers: Vec<Box<dyn LLMProvider>> = Vec::new();
    for name in KNOWN_PROVIDERS {
        let Some(provider_config) = config.llm.provider(name) else {
            continue;
        };
        if !secrets.has_secret(&provider_config.api_key_env) {
            tracing::debug!("Skipping provider {}: no API key", name);
            continue;
        }
        if *name == "gemini" {
            providers.push(Box::new(GeminiProvider::new(
                provider_config.clone(),
                Arc::clone(secrets),
            )));
        } else {
            providers.push(Box::new(OpenAICompatibleProvider::new(
                *name,
                provider_config.clone(),
                Arc::clone(secrets),
            )));
        }
    }
    providers
}

/// How an interactive session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `q`, end of input, or the user declined to continue
    Quit,
    /// Ctrl-C at the prompt; a blocked stdin reader may still be running
    Interrupted,
}

/// The long-lived parts of an interactive session
pub struct Session {
    config: Config,
    router: Arc<LLMRouter>,
    hot: Arc<HotMemory>,
    warm: WarmMemory,
    store: Arc<dyn DurableStore>,
    tools: ToolRegistry,
    interrupt: InterruptHandle,
}

impl Session {
    pub async fn open(config: Config) -> Result<Self> {
        let data_dir = config.core.data_dir.clone();

        let secrets = Arc::new(SecretCache::new(Arc::new(SecretManager::new(
            KEYCHAIN_SERVICE,
        ))));
        let providers = build_providers(&config, &secrets);
        if providers.is_empty() {
            return Err(anyhow::anyhow!(
                "No LLM providers configured. Export GROQ_API_KEY, GEMINI_API_KEY, \
                 OPENROUTER_API_KEY or CEREBRAS_API_KEY, or run `analyst key <provider>`"
            ));
        }

        let runtime = Arc::new(RuntimeConfig::from_config(&config.llm));
        let router = Arc::new(
            LLMRouter::new(providers, runtime)
                .with_timeout(Duration::from_secs(config.llm.request_timeout_secs)),
        );

        let store = open_cold_store(&config.memory.cold_path(&data_dir)).await;
        let archiver = Arc::new(Archiver::new(
            Arc::clone(&store),
            Some(Arc::clone(&router) as Arc<dyn crate::memory::Summarizer>),
            ArchiveMode::Background,
        ));
        let warm = WarmMemory::connect(
            config.workflow.session_id.clone(),
            &config.memory,
            &data_dir,
            archiver,
        )
        .await;

        let hot = Arc::new(HotMemory::load(config.memory.hot_path(&data_dir)));
        let tools = build_tools(&config, &store)?;

        Ok(Self {
            config,
            router,
            hot,
            warm,
            store,
            tools,
            interrupt: InterruptHandle::new(),
        })
    }

    fn orchestrator(&self) -> Orchestrator {
        let crew = Crew::assemble(
            &self.hot,
            &self.router,
            &self.tools,
            &self.warm,
            WorkerSettings::from(&self.config),
            &self.interrupt,
        );
        Orchestrator::new(
            Planner::new(Arc::clone(&self.router)),
            crew,
            WorkflowLimits::from(&self.config.workflow),
            self.interrupt.clone(),
        )
    }

    /// Run the Contextor; `false` when the user chose not to continue
    async fn build_context(&self, prompter: &dyn Prompter) -> Result<bool> {
        let profiler = PythonProfiler::new(
            self.config.tools.python.clone(),
            Duration::from_secs(self.config.tools.timeout_secs),
        );
        let contextor = Contextor::new(
            Arc::clone(&self.router),
            Arc::new(profiler),
            Arc::clone(&self.hot),
            self.warm.clone(),
            Arc::clone(&self.store),
        );

        let proceed = match contextor.run(prompter).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                prompter.say("⚠️ Project context was not completed.");
                true
            }
            Err(e) => {
                tracing::error!("Context building failed: {}", e);
                prompter.say(&format!("❌ Error building context: {}", e));
                prompter.say(&format!("💡 {}", e.user_hint()));
                let answer = prompter.ask("Continue to Router anyway? (y/n): ").await?;
                is_yes(answer.as_deref())
            }
        };

        contextor.drain().await;
        Ok(proceed)
    }

    /// Context check followed by the request loop, until quit or Ctrl-C
    pub async fn run(&self, prompter: &dyn Prompter) -> Result<SessionEnd> {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        self.run_until(prompter, ctrl_c).await
    }

    /// Like [`Session::run`], ending early once `stop` resolves at the prompt
    pub async fn run_until(
        &self,
        prompter: &dyn Prompter,
        stop: impl std::future::Future<Output = ()>,
    ) -> Result<SessionEnd> {
        tokio::pin!(stop);

        prompter.say("==============================================");
        prompter.say("🧠 Analyst: multi-agent data analysis");
        prompter.say("==============================================");

        if self.hot.is_empty() {
            prompter.say("No project context found. Starting Contextor...");
            if !self.build_context(prompter).await? {
                return Ok(SessionEnd::Quit);
            }
        } else {
            prompter.say("📂 Existing project context:");
            prompter.say(&preview(&self.hot.get_context(), PREVIEW_CHARS));
            let answer = prompter
                .ask("Reset context and re-run Contextor? (y/n): ")
                .await?;
            if is_yes(answer.as_deref()) {
                self.hot.clear();
                if !self.build_context(prompter).await? {
                    return Ok(SessionEnd::Quit);
                }
            }
        }

        let orchestrator = self.orchestrator();
        prompter.say("Commands: q/exit/quit, graph, /switch <provider> [model], /reset");

        loop {
            let line = tokio::select! {
                line = prompter.ask("\n👤 You: ") => line?,
                _ = &mut stop => {
                    prompter.say("\nGoodbye!");
                    self.shutdown().await;
                    return Ok(SessionEnd::Interrupted);
                }
            };
            let Some(line) = line else {
                break;
            };

            match SessionCommand::parse(&line) {
                SessionCommand::Empty => continue,
                SessionCommand::Quit => break,
                SessionCommand::Graph => prompter.say(&render_graph()),
                SessionCommand::Reset => {
                    self.hot.clear();
                    prompter.say(RESET_NOTICE);
                }
                SessionCommand::Switch { provider, model } => {
                    match self
                        .router
                        .runtime()
                        .switch_provider(&provider, model.as_deref())
                    {
                        Ok(active) => prompter.say(&format!("✅ Switched to {}", active)),
                        Err(e) => prompter.say(&format!("❌ {}", e)),
                    }
                }
                SessionCommand::Request(request) => {
                    self.interrupt.reset();
                    let listener = self.interrupt.listen_for_ctrl_c();
                    let result = orchestrator.run(&request).await;
                    listener.abort();

                    match result {
                        Ok(outcome) => show_outcome(prompter, &outcome),
                        Err(e) => {
                            tracing::error!("Request failed: {}", e);
                            prompter.say(&format!("❌ {}", e));
                            prompter.say(&format!("💡 {}", e.user_hint()));
                        }
                    }
                }
            }
        }

        prompter.say("Goodbye!");
        self.shutdown().await;
        Ok(SessionEnd::Quit)
    }

    async fn shutdown(&self) {
        tracing::info!("Waiting for pending archive writes");
        self.warm.archiver().drain().await;
    }
}

fn is_yes(answer: Option<&str>) -> bool {
    matches!(answer.map(|a| a.trim().to_lowercase()).as_deref(), Some("y" | "yes"))
}

fn show_outcome(prompter: &dyn Prompter, outcome: &WorkflowOutcome) {
    for reply in &outcome.chat_responses {
        prompter.say(&format!("\n🤖 Router: {}", reply));
    }
    // The first entry is the request itself
    for entry in outcome.transcript.iter().skip(1) {
        if !entry.starts_with("Router Decision:") {
            prompter.say(&format!("\n{}", entry));
        }
    }
    if outcome.interrupted() {
        prompter.say("\n⚠️ Interrupted. Back at the prompt.");
    }
    if let Some(note) = &outcome.stopped_early {
        prompter.say(&format!("\n⚠️ {}", note));
    }
}

async fn open_cold_store(path: &Path) -> Arc<dyn DurableStore> {
    match Database::new(path).await {
        Ok(db) => Arc::new(SqliteFtsStore::new(db)),
        Err(e) => {
            tracing::warn!("Cold storage unavailable, archives will be dropped: {:#}", e);
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}

fn build_tools(config: &Config, store: &Arc<dyn DurableStore>) -> Result<ToolRegistry> {
    std::fs::create_dir_all(&config.tools.work_dir).with_context(|| {
        format!(
            "Failed to create tools work dir {}",
            config.tools.work_dir.display()
        )
    })?;

    let timeout = Duration::from_secs(config.tools.timeout_secs);
    let approval: Arc<dyn InstallApproval> = if config.tools.confirm_installs {
        Arc::new(TerminalApproval)
    } else {
        Arc::new(AutoApprove)
    };

    Ok(ToolRegistry::new()
        .with(Arc::new(PythonInterpreterTool::new(
            config.tools.python.clone(),
            config.tools.work_dir.clone(),
            timeout,
        )))
        .with(Arc::new(InstallPackageTool::new(
            config.tools.python.clone(),
            timeout,
            approval,
        )))
        .with(Arc::new(ChatLogSearchTool::new(Arc::clone(store)))))
}

/// Start the interactive session
pub async fn handle_session(config: Config) -> Result<SessionEnd> {
    let session = Session::open(config).await?;
    session.run(&TerminalPrompter).await
}

pub fn handle_graph() -> Result<()> {
    println!("{}", render_graph());
    Ok(())
}

/// Dump every Warm session to `output` or stdout
pub async fn handle_memory_dump(config: &Config, output: Option<&Path>) -> Result<()> {
    let backend = select_backend(&config.memory, &config.core.data_dir).await;
    let dump = backend.dump().await?;
    let text = serde_json::to_string_pretty(&dump)?;

    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Warm memory dumped to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

pub async fn handle_memory_clear(config: &Config, tier: Tier) -> Result<()> {
    let data_dir = &config.core.data_dir;

    if matches!(tier, Tier::Hot | Tier::All) {
        HotMemory::load(config.memory.hot_path(data_dir)).clear();
        println!("✅ Hot memory cleared");
    }
    if matches!(tier, Tier::Warm | Tier::All) {
        select_backend(&config.memory, data_dir)
            .await
            .clear_all()
            .await?;
        println!("✅ Warm memory cleared");
    }
    if matches!(tier, Tier::Cold | Tier::All) {
        let db = Database::new(&config.memory.cold_path(data_dir))
            .await
            .context("Failed to open cold storage")?;
        SqliteFtsStore::new(db).clear().await?;
        println!("✅ Cold memory cleared");
    }
    Ok(())
}

/// Prompt for a provider's API key and store it in the keychain
pub fn handle_key(config: &Config, provider: &str) -> Result<()> {
    let provider = provider.trim().to_lowercase();
    let provider_config = config
        .llm
        .provider(&provider)
        .ok_or_else(|| EngineError::UnknownProvider(provider.clone()))?;

    SecretManager::new(KEYCHAIN_SERVICE).prompt_and_store(&provider_config.api_key_env)?;
    println!("✅ Stored {} for {}", provider_config.api_key_env, provider);
    Ok(())
}
