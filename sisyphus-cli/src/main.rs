//! Sisyphus CLI - commitment enforcement from your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{demo, logs, run, status, sweep};

/// Sisyphus - check in, or your secret gets out
#[derive(Parser)]
#[command(name = "sisyphus", version, about, long_about = None)]
struct Cli {
    /// Show diagnostic output on stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sweep: disclose and seal every overdue account
    Sweep {
        /// Hours allowed between check-ins (default from settings)
        #[arg(long)]
        grace_hours: Option<u32>,
        /// Give up on unfinished accounts after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Report overdue accounts without disclosing or sealing them
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run sweeps on a fixed interval until interrupted
    Run {
        /// Seconds between sweeps (default from settings)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Show account status and deadlines
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = dispatch(cli.command).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Sweep {
            grace_hours,
            timeout_secs,
            dry_run,
            json,
        } => {
            sweep::run(sweep::SweepArgs {
                grace_hours,
                timeout_secs,
                dry_run,
                json,
            })
            .await
        }
        Commands::Run { interval_secs } => run::run(interval_secs).await,
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
        Commands::Demo { command } => demo::run(command),
    }
}
