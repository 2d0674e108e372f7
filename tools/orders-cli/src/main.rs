//! Orders CLI - Command line tool for the TurboCommerce order engine.
//!
//! Commands:
//! - `orders config` - Create, show and validate the engine configuration
//! - `orders sign` - Compute a gateway callback signature
//! - `orders demo` - Run an order lifecycle against an in-memory engine

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use turbo_orders::telemetry::{init_tracing, LogFormat};

use commands::{ConfigArgs, DemoArgs, SignArgs};

/// Orders CLI - Inspect and exercise the order lifecycle engine
#[derive(Parser)]
#[command(name = "orders")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Sign a payment callback with the configured gateway secret
    Sign(SignArgs),

    /// Run a sample order lifecycle
    Demo(DemoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "turbo_orders=debug" } else { "warn" };
    let format = if cli.json { LogFormat::Json } else { LogFormat::Human };
    init_tracing(filter, format);

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let ctx = context::Context::load(cli.config.as_deref(), output)?;
    tracing::debug!(config_path = ?ctx.config_path, "configuration loaded");

    // Execute command
    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Sign(args) => commands::sign::run(args, &ctx).await,
        Commands::Demo(args) => commands::demo::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
