use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Demonstrations of the spool concurrency primitives.
///
/// Each subcommand runs one scenario end to end and logs what happens.
#[derive(Parser, Debug)]
#[command(name = "spool", version, about = "Worker pools, deferreds and batched flushing")]
pub struct CliArgs {
    /// Path to a TOML config file (defaults plus SPOOL_* env vars otherwise)
    #[arg(long, global = true, env = "SPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fork a sleep under a timeout shorter than the sleep, then resume
    Sleep(SleepArgs),

    /// Complete a deferred from a forked computation that may fail
    Deferred,

    /// Distribute numbered work items across worker pools
    Distribute(DistributeArgs),

    /// Route log events through a batching flush buffer
    BatchedLog(BatchedLogArgs),
}

#[derive(Args, Debug)]
pub struct SleepArgs {
    /// How long the forked task sleeps
    #[arg(long, default_value = "1000")]
    pub millis: u64,

    /// Timeout applied to the forked sleep (default: 100 ms less than --millis)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DistributeArgs {
    /// Number of producer rounds (each offers 0..=100)
    #[arg(long, default_value = "3")]
    pub rounds: u32,

    /// Pause between producer rounds, in milliseconds
    #[arg(long, default_value = "1000")]
    pub every_ms: u64,

    /// Which pool(s) to run: all, sequential, unbounded, bounded or bounded:N
    #[arg(long, default_value = "all")]
    pub policy: String,

    /// Simulated work per item, in milliseconds
    #[arg(long, default_value = "20")]
    pub work_ms: u64,
}

#[derive(Args, Debug)]
pub struct BatchedLogArgs {
    /// Flush window in milliseconds (default: flush.window_ms from config)
    #[arg(long)]
    pub window_ms: Option<u64>,

    /// Interval between logging rounds, in milliseconds
    #[arg(long, default_value = "500")]
    pub every_ms: u64,

    /// Number of repetitions after the first round
    #[arg(long, default_value = "10")]
    pub recurs: u32,
}
