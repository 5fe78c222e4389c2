//! capstan - blueprint orchestration CLI
//!
//! Usage: capstan <COMMAND>
//!
//! Commands:
//!   up    Resolve the blueprint, apply it, and wait for convergence
//!   down  Tear the applied blueprint down in reverse dependency order

mod client;
mod store;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use capstan::blueprint::BlueprintLoader;
use capstan::orchestrator::{Orchestrator, ProgressEvent, ProgressReporter};
use capstan::{ConfigStore, ProjectShell, Shell, SubstitutionEvaluator};

use client::DryRunClient;
use store::FileStore;

/// capstan - blueprint orchestration engine
#[derive(Parser, Debug)]
#[command(name = "capstan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the blueprint, apply it, and wait for convergence
    Up {
        /// Convergence deadline in seconds (default: dependency-graph estimate)
        #[arg(long)]
        timeout: Option<u64>,

        /// Ignore a persisted blueprint and re-render from the template
        #[arg(long)]
        reset: bool,

        /// Persist the resolved blueprint unless one is already persisted
        #[arg(short, long)]
        write: bool,

        /// Persist the resolved blueprint, replacing a persisted one
        #[arg(long, conflicts_with = "write")]
        overwrite: bool,
    },

    /// Tear the applied blueprint down in reverse dependency order
    Down,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let shell = ProjectShell::new();
    let project_root = shell
        .project_root()
        .context("Failed to locate the project root")?;
    let store = FileStore::open(&project_root)?;
    info!(
        "Using context '{}' from {}",
        store.context_name(),
        store.path().display()
    );

    match cli.command {
        Commands::Up {
            timeout,
            reset,
            write,
            overwrite,
        } => cmd_up(&store, &shell, timeout, reset, write || overwrite, overwrite),
        Commands::Down => cmd_down(&store, &shell),
    }
}

fn cmd_up(
    store: &FileStore,
    shell: &ProjectShell,
    timeout: Option<u64>,
    reset: bool,
    persist: bool,
    overwrite: bool,
) -> Result<()> {
    let evaluator = SubstitutionEvaluator::new();
    let mut loader = BlueprintLoader::new(store, &evaluator);
    loader.load(reset)?;

    if persist {
        let path = loader.write(overwrite)?;
        info!("Blueprint persisted to {}", path.display());
    }

    let client = DryRunClient::new();
    let orchestrator = Orchestrator::new(
        loader.blueprint().clone(),
        loader.template_data().clone(),
        store,
        shell,
        &client,
    );
    orchestrator.up(timeout.map(Duration::from_secs), &StderrProgress)?;
    Ok(())
}

fn cmd_down(store: &FileStore, shell: &ProjectShell) -> Result<()> {
    let evaluator = SubstitutionEvaluator::new();
    let mut loader = BlueprintLoader::new(store, &evaluator);
    loader.load(false)?;

    let client = DryRunClient::new();
    let orchestrator = Orchestrator::new(
        loader.blueprint().clone(),
        loader.template_data().clone(),
        store,
        shell,
        &client,
    );
    orchestrator.down(&StderrProgress)?;
    Ok(())
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_log::LogTracer::init().context("Failed to route log records into tracing")?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
    Ok(())
}

/// Renders phase updates on stderr.
struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => eprintln!("[{:?}] {}", phase, message),
            ProgressEvent::Completed { units } => {
                eprintln!("Completed: {}", units.join(", "));
            }
            ProgressEvent::Failed { error } => eprintln!("Failed: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_up_defaults() {
        let cli = Cli::try_parse_from(["capstan", "up"]).unwrap();
        if let Commands::Up {
            timeout,
            reset,
            write,
            overwrite,
        } = cli.command
        {
            assert_eq!(timeout, None);
            assert!(!reset);
            assert!(!write);
            assert!(!overwrite);
        } else {
            panic!("Expected Up command");
        }
    }

    #[test]
    fn test_cli_parse_up_with_flags() {
        let cli =
            Cli::try_parse_from(["capstan", "up", "--timeout", "900", "--reset", "--overwrite"])
                .unwrap();
        if let Commands::Up {
            timeout,
            reset,
            overwrite,
            ..
        } = cli.command
        {
            assert_eq!(timeout, Some(900));
            assert!(reset);
            assert!(overwrite);
        } else {
            panic!("Expected Up command");
        }
    }

    #[test]
    fn test_cli_write_conflicts_with_overwrite() {
        assert!(Cli::try_parse_from(["capstan", "up", "--write", "--overwrite"]).is_err());
    }

    #[test]
    fn test_cli_parse_down() {
        let cli = Cli::try_parse_from(["capstan", "down"]).unwrap();
        assert!(matches!(cli.command, Commands::Down));
    }

    #[test]
    fn test_cli_verbose_count() {
        let cli = Cli::try_parse_from(["capstan", "-vv", "down"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
