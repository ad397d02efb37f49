//! CLI entry point for the bookmeta tool.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Args, Command, ConfigCommand};
use commands::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    if let Command::Config {
        command: ConfigCommand::Show,
    } = &args.command
    {
        return commands::run_config_show_command(&args);
    }

    info!("Bookmeta starting");
    let context = AppContext::open(&args).await?;
    debug!(providers = ?context.providers(), "Providers ready");

    match &args.command {
        Command::Search(search) => commands::run_search_command(&context, search).await,
        Command::Add(add) => commands::run_add_command(&context, add).await,
        Command::Enrich(enrich) => {
            commands::run_enrich_command(&context, enrich, args.quiet).await
        }
        Command::Editions(editions) => commands::run_editions_command(&context, editions).await,
        Command::Links(links) => commands::run_links_command(&context, links),
        // Handled before the catalog is opened.
        Command::Config { .. } => Ok(()),
    }
}
