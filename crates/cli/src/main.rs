//! Tariff CLI
//!
//! Main entry point for the `tariff` command-line tool.
//! Answers questions about LTL carrier rules tariffs from pre-built context
//! tables with a local language model.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, PromptsCommand};
use std::path::PathBuf;
use tariff_core::logging::{self, LogFormat};
use tariff_core::{config::AppConfig, AppResult};

/// Tariff - question answering over LTL rules tariffs
#[derive(Parser, Debug)]
#[command(name = "tariff")]
#[command(about = "Question answering over LTL rules tariffs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "TARIFF_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "TARIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama)
    #[arg(short, long, global = true, env = "TARIFF_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "TARIFF_MODEL")]
    model: Option<String>,

    /// Provider endpoint URL
    #[arg(long, global = true, env = "TARIFF_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question about the loaded tariffs
    Ask(AskCommand),

    /// Manage system prompts
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from config file and environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, cli.log_format)?;

    tracing::info!("Tariff CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) if e.is_generation_failure() => tracing::error!(
            "Command failed: {} (is {} reachable at {}?)",
            e,
            config.provider,
            config.endpoint.as_deref().unwrap_or("its default endpoint")
        ),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
