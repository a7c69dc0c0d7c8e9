mod batched_log;
mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // The batched logger replaces the default output instead of adding to it.
    if !matches!(args.command, Command::BatchedLog(_)) {
        init_tracing();
    }

    let config = config::load(args.config.as_deref())?;

    match args.command {
        Command::Sleep(sleep) => commands::sleep_demo(sleep).await,
        Command::Deferred => commands::deferred_demo().await,
        Command::Distribute(distribute) => commands::distribute_demo(distribute, &config).await,
        Command::BatchedLog(batched) => commands::batched_log_demo(batched, &config).await,
    }
}
