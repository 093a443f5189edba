//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DrBot - moderation automation host
#[derive(Parser, Debug)]
#[command(name = "drbot")]
#[command(about = "Moderation automation host running Botlings over moderation events", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute (defaults to run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file used in place of ./drbot.toml
    #[arg(short, long, global = true, env = "DRBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log side effects instead of performing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Poll and dispatch until interrupted
    Run,
    /// Validate configuration and Botling settings, then exit
    Check,
}
