//! natsync: keeps the NATS authorization config in step with PocketBase.
//!
//! # Usage
//!
//! ```text
//! natsync [--config <path>] [run]
//! natsync [--config <path>] once
//! natsync [--config <path>] diff
//! natsync [--config <path>] backups [--json]
//! natsync [--config <path>] sweep [--days <n>]
//! ```
//!
//! Without a subcommand the service runs until SIGINT or SIGTERM.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    backups::BackupsArgs, diff::DiffArgs, once::OnceArgs, run::RunArgs, sweep::SweepArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "natsync",
    version,
    about = "Generate NATS authorization config from PocketBase users and roles",
    long_about = None,
)]
struct Cli {
    /// Config file, or a directory holding `config.yaml`.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync loop until interrupted (the default).
    Run(RunArgs),

    /// Run a single sync cycle and exit.
    Once(OnceArgs),

    /// Show the unified diff between the live config and a fresh render.
    Diff(DiffArgs),

    /// List backups of previously published configs.
    Backups(BackupsArgs),

    /// Delete backups older than the retention period.
    Sweep(SweepArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => args.run(config),
        Commands::Once(args) => args.run(config),
        Commands::Diff(args) => args.run(config),
        Commands::Backups(args) => args.run(config),
        Commands::Sweep(args) => args.run(config),
    }
}
