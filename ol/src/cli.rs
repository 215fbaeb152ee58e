//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Optloop - autonomous iterative optimisation loop
#[derive(Parser)]
#[command(
    name = "ol",
    about = "Let a model iteratively edit a system until its evaluations improve",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Optimise the system rooted at a directory
    Run {
        /// Root directory of the system being optimised
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Project breakdown YAML describing key files and actions
        #[arg(short, long)]
        breakdown: PathBuf,

        /// Shell command running the eval suite; prints the results as JSON
        #[arg(short, long)]
        eval_command: String,

        /// Stop after this many iterations
        #[arg(short, long)]
        max_iterations: Option<u32>,
    },

    /// List stored runs
    Runs,

    /// Show the stored results and conversation of a run
    Review {
        /// Run id as printed by `run`
        run_id: String,

        /// Truncate each message to this many characters
        #[arg(long, default_value_t = 2000)]
        max_chars: usize,
    },
}
