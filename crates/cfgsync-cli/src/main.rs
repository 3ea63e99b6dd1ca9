//! cfgsync CLI
//!
//! Mirrors remote configuration objects into a local workspace and back,
//! and replicates them between tenants.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use context::Workspace;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let Some(command) = cli.command else {
        println!("{} Configuration sync CLI", "cfgsync".green().bold());
        println!();
        println!("Run {} for available commands.", "cfgsync --help".cyan());
        return Ok(());
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} finishing the current object, then stopping", "Interrupted:".yellow());
                on_interrupt.cancel();
            }
        });
        execute_command(command, cli.root.as_deref(), cancel).await
    })
}

/// `--verbose` logs at DEBUG; otherwise `RUST_LOG` decides, defaulting to warnings.
fn init_logging(verbose: bool) -> Result<()> {
    let result = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    result.map_err(|e| CliError::user(format!("Failed to set tracing subscriber: {e}")))?;
    tracing::debug!("Verbose mode enabled");
    Ok(())
}

async fn execute_command(
    cmd: Commands,
    root: Option<&std::path::Path>,
    cancel: CancellationToken,
) -> Result<()> {
    match cmd {
        Commands::Init {
            tenant,
            base_url,
            token_env,
            workspace_id,
        } => {
            let dir = match root {
                Some(root) => root.to_path_buf(),
                None => std::env::current_dir()?,
            };
            commands::run_init(&dir, &tenant, &base_url, token_env.as_deref(), workspace_id)
        }
        Commands::Compare {
            source_dir,
            target_dir,
            mapping,
            json,
        } => commands::run_compare(&source_dir, &target_dir, mapping.as_deref(), json),
        Commands::Pull {
            tenant,
            workspace,
            overwrite_local,
            json,
        } => {
            let ws = Workspace::open(root, cancel)?;
            commands::run_pull(&ws, tenant.as_deref(), workspace, overwrite_local, json).await
        }
        Commands::Diff {
            tenant,
            workspace,
            json,
        } => {
            let ws = Workspace::open(root, cancel)?;
            commands::run_diff(&ws, tenant.as_deref(), workspace, json).await
        }
        Commands::Push {
            tenant,
            dry_run,
            force,
            json,
        } => {
            let ws = Workspace::open(root, cancel)?;
            commands::run_push(&ws, tenant.as_deref(), dry_run, force, json).await
        }
        Commands::Copy {
            to,
            from,
            workspace,
            json,
        } => {
            let ws = Workspace::open(root, cancel)?;
            commands::run_copy(&ws, from.as_deref(), &to, workspace, json).await
        }
        Commands::Deploy {
            to,
            from,
            dry_run,
            force,
            json,
        } => {
            let ws = Workspace::open(root, cancel)?;
            commands::run_deploy(&ws, from.as_deref(), &to, dry_run, force, json).await
        }
    }
}
