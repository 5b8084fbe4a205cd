//! Grounded CLI
//!
//! Main entry point for the grounded customer-support service.
//! Builds every component from configuration and dispatches subcommands.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ChatCommand, IngestCommand, SeedDemoCommand, ServeCommand, StatsCommand};
use grounded_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Grounded - evidence-grounded answers over order, billing, inventory and product docs
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Evidence-grounded customer support engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeCommand),

    /// Answer a single message and print the response JSON
    Chat(ChatCommand),

    /// Ingest a document corpus into the retrieval index
    Ingest(IngestCommand),

    /// Index the demonstration spec sheets
    SeedDemo(SeedDemoCommand),

    /// Show retrieval index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, YAML file, then environment
    let config = AppConfig::load(cli.config.as_deref())?;

    let bind = match &cli.command {
        Commands::Serve(cmd) => cmd.bind.clone(),
        _ => None,
    };
    let config = config.with_overrides(cli.log_level, cli.verbose, cli.no_color, cli.log_json, bind);

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    config.validate()?;

    tracing::info!("Grounded starting");
    tracing::debug!("Config file: {:?}", config.config_file);
    tracing::debug!("Index: {:?}", config.retrieval.index_path);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Chat(_) => "chat",
        Commands::Ingest(_) => "ingest",
        Commands::SeedDemo(_) => "seed-demo",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::SeedDemo(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
