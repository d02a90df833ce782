// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! agentscan - security scan orchestration engine.
//!
//! This is the binary entry point: `serve` runs the worker pool, the other
//! subcommands submit and inspect scans in the shared store.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod command_agent;
mod commands;
mod engine;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// agentscan - security scan orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "agentscan", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the worker pool until interrupted.
    Serve,
    /// Submit a scan.
    Submit(commands::SubmitArgs),
    /// Show the status of a scan.
    Status { scan_id: String },
    /// Show the findings and per-agent results of a scan.
    Results(commands::ResultsArgs),
    /// Cancel a scan that has not finished.
    Cancel { scan_id: String },
    /// List scans, newest first.
    List(commands::ListArgs),
    /// Show queue counts by status and priority.
    QueueStats,
    /// Health-check and list the configured agents.
    Agents,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => agentscan_config::load_and_validate_path(path),
        None => agentscan_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            agentscan_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Submit(args) => commands::submit(&config, args).await,
        Commands::Status { scan_id } => commands::status(&config, &scan_id).await,
        Commands::Results(args) => commands::results(&config, args).await,
        Commands::Cancel { scan_id } => commands::cancel(&config, &scan_id).await,
        Commands::List(args) => commands::list(&config, args).await,
        Commands::QueueStats => commands::queue_stats(&config).await,
        Commands::Agents => commands::agents(&config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
