//! Optloop - autonomous iterative optimisation loop
//!
//! CLI entry point for starting and reviewing optimisation runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use optloop::cli::{Cli, Command};
use optloop::config::Config;
use optloop::eval::CommandEvalSuite;
use optloop::llm::{Role, create_client};
use optloop::monitor::LoggingMonitor;
use optloop::optimiser::{Optimiser, OptimiserDeps, OptimiserSettings};
use optloop::state::ProjectBreakdown;
use optloop::storage::{EvalStore, FileStore, MessageStore};
use optloop::workspace::{LocalFileManager, LocalShell};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Can't log here yet, logging isn't initialised
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("optloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("optloop.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Optloop loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            root,
            breakdown,
            eval_command,
            max_iterations,
        } => cmd_run(&config, &root, &breakdown, &eval_command, max_iterations).await,
        Command::Runs => cmd_runs(&config),
        Command::Review { run_id, max_chars } => cmd_review(&config, &run_id, max_chars).await,
    }
}

async fn cmd_run(
    config: &Config,
    root: &Path,
    breakdown_path: &Path,
    eval_command: &str,
    max_iterations: Option<u32>,
) -> Result<()> {
    debug!(root = %root.display(), breakdown = %breakdown_path.display(), %eval_command, ?max_iterations, "cmd_run: called");
    config.validate()?;

    let root = root
        .canonicalize()
        .context(format!("Root directory not found: {}", root.display()))?;
    let breakdown = ProjectBreakdown::load(breakdown_path)?;

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let store = Arc::new(FileStore::open(config.storage.expanded_runs_dir()).context("Failed to open run store")?);
    let monitor = Arc::new(LoggingMonitor::new());

    let deps = OptimiserDeps {
        llm,
        files: Arc::new(LocalFileManager::new(&root)),
        shell: Arc::new(LocalShell::new(&root, config.shell.max_timeout_secs)),
        suite: Arc::new(CommandEvalSuite::new(
            eval_command,
            &root,
            Duration::from_secs(config.eval.timeout_secs),
        )),
        eval_store: store.clone() as Arc<dyn EvalStore>,
        message_store: store as Arc<dyn MessageStore>,
        monitor: monitor.clone(),
    };

    let mut settings = OptimiserSettings::from_config(config);
    if max_iterations.is_some() {
        settings.max_iterations = max_iterations;
    }

    let mut optimiser = Optimiser::new(deps, breakdown, settings)?;
    println!("Optimising {}", root.display());
    println!("  Run: {}", optimiser.run_id());
    println!("  Eval command: {}", eval_command);
    println!();

    let run_id = optimiser.optimise().await?;
    let (best, best_iteration) = monitor.best();
    println!("Run {} finished", run_id);
    println!("  Best pass rate: {:.1}% (iteration {})", best, best_iteration);
    Ok(())
}

fn cmd_runs(config: &Config) -> Result<()> {
    debug!("cmd_runs: called");
    let store = FileStore::open(config.storage.expanded_runs_dir())?;
    let runs = store.list_runs()?;

    if runs.is_empty() {
        println!("No runs found in {}", config.storage.expanded_runs_dir().display());
        return Ok(());
    }

    println!("{:<38} {:<20} {:>10}", "RUN", "UPDATED", "ITERATION");
    for run in runs {
        let last = run
            .last_iteration
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<20} {:>10}",
            run.run_id,
            run.updated_at.format("%Y-%m-%d %H:%M:%S"),
            last
        );
    }
    Ok(())
}

async fn cmd_review(config: &Config, run_id: &str, max_chars: usize) -> Result<()> {
    debug!(%run_id, %max_chars, "cmd_review: called");
    let store = FileStore::open(config.storage.expanded_runs_dir())?;

    let iterations = store.iterations(run_id)?;
    if iterations.is_empty() {
        return Err(eyre::eyre!("No stored results for run {}", run_id));
    }

    println!("Run {}", run_id);
    println!();
    for iteration in iterations {
        if let Some(result) = store.get_eval_results(run_id, iteration).await? {
            println!("Iteration {}: {}", iteration, result.summarise().total_line());
        }
    }

    let Some(messages) = store.get_messages(run_id).await? else {
        println!();
        println!("No conversation stored.");
        return Ok(());
    };

    for message in messages {
        let role = match message.role {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        };
        println!();
        println!("--- {} ---", role);
        println!("{}", truncate(&message.content, max_chars));
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}... [{} more chars]", &text[..idx], text[idx..].chars().count()),
        None => text.to_string(),
    }
}
