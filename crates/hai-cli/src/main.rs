//! hai - turn natural language into shell commands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod executor;
mod output;

use commands::ask::AskOptions;
use config::HaiConfig;

/// Describe what you want to do; hai suggests the shell command
#[derive(Parser)]
#[command(name = "hai")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// What you want to do, in plain words
    query: Vec<String>,

    /// Use this provider instead of the configured one
    #[arg(short, long)]
    provider: Option<String>,

    /// List configured providers and whether they are reachable
    #[arg(long)]
    list_providers: bool,

    /// Config file (default: ~/.hai/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Neither read nor update memory
    #[arg(long)]
    no_memory: bool,

    /// Run the command without asking (unsafe commands still ask)
    #[arg(short, long)]
    yes: bool,

    /// Show the command but never run it
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or reset what hai remembers
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show how much is stored in each memory tier
    Stats,
    /// Forget session, project and preference memory
    Clear,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging; HAI_LOG wins over --verbose
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("HAI_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = HaiConfig::load(cli.config.as_deref()).map_err(|e| miette::miette!("{}", e))?;

    if let Some(Commands::Memory { action }) = &cli.command {
        return match action {
            MemoryAction::Stats => commands::memory::stats(&config),
            MemoryAction::Clear => commands::memory::clear(&config),
        };
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("failed to start async runtime: {}", e))?;

    if cli.list_providers {
        return runtime.block_on(commands::providers::run(&config));
    }

    let query = cli.query.join(" ");
    if query.trim().is_empty() {
        return Err(miette::miette!(
            "nothing to do: describe what you want, e.g. `hai list large files`"
        ));
    }

    let options = AskOptions {
        query: query.trim(),
        provider: cli.provider.as_deref(),
        no_memory: cli.no_memory,
        yes: cli.yes,
        dry_run: cli.dry_run,
    };
    let status = runtime.block_on(commands::ask::run(&config, options))?;
    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
