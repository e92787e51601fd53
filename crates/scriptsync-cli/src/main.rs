//! `scriptsync` -- CLI binary for live script alignment.
//!
//! Provides the following subcommands:
//!
//! - `scriptsync segment` -- Show how a script is cut into match units.
//! - `scriptsync track` -- Follow a transcript file against a script and
//!   print alignment events as JSON lines.
//! - `scriptsync config` -- Show the resolved configuration.

use clap::{Parser, Subcommand};

mod commands;

/// Live script alignment CLI.
#[derive(Parser)]
#[command(name = "scriptsync", about = "Live script alignment CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Segment a script and print its match units.
    Segment(commands::segment::SegmentArgs),

    /// Track a transcript file against a script.
    Track(commands::track::TrackArgs),

    /// Show resolved configuration.
    Config(commands::config_cmd::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Segment(args) => commands::segment::run(args).await?,
        Commands::Track(args) => commands::track::run(args).await?,
        Commands::Config(args) => commands::config_cmd::run(args)?,
    }

    Ok(())
}
