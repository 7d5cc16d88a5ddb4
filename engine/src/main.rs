// analyst: tiered-memory multi-agent data analyst
// Main entry point for the analyst binary

use analyst_engine::cli::{Cli, Command, MemoryAction};
use analyst_engine::config::Config;
use analyst_engine::handlers::{
    handle_graph, handle_key, handle_memory_clear, handle_memory_dump, handle_session,
    SessionEnd,
};
use analyst_engine::telemetry::init_telemetry_with_level;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::info!("analyst v{}", env!("CARGO_PKG_VERSION"));

    match cli.command() {
        Command::Run => {
            if handle_session(config).await? == SessionEnd::Interrupted {
                // The stdin reader thread is still blocked and would keep the runtime alive
                std::process::exit(0);
            }
            Ok(())
        }
        Command::Graph => handle_graph(),
        Command::Memory { action } => match action {
            MemoryAction::Dump { output } => handle_memory_dump(&config, output.as_deref()).await,
            MemoryAction::Clear { tier } => handle_memory_clear(&config, *tier).await,
        },
        Command::Key { provider } => handle_key(&config, provider),
    }
}
