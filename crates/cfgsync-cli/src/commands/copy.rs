//! Copy command implementation

use cfgsync_core::{CopyEngine, CopyReport, RemoteClient};
use colored::Colorize;

use super::{finish, print_failures, print_json, print_skipped};
use crate::context::Workspace;
use crate::error::{CliError, Result};

/// Run the copy command
pub async fn run_copy(
    ws: &Workspace,
    from: Option<&str>,
    to: &str,
    workspace_id: Option<u64>,
    json: bool,
) -> Result<()> {
    let source = ws.remote(from)?;
    let target = ws.remote(Some(to))?;
    if source.tenant().name == target.tenant().name {
        return Err(CliError::user(format!(
            "Source and target are both '{to}'; copy needs two different tenants"
        )));
    }

    let engine = CopyEngine::new(ws.root.clone(), &source, &target)
        .with_retry(ws.retry())
        .with_concurrency(ws.config.concurrency)
        .with_cancellation(ws.cancel());
    let report = match workspace_id.or(ws.config.workspace_id) {
        Some(id) => engine.copy_workspace(id).await?,
        None => engine.copy_all().await?,
    };

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, &source.tenant().name, to);
    }
    finish(report.failed.len(), report.cancelled)
}

fn print_report(report: &CopyReport, from: &str, to: &str) {
    println!("{} {} -> {}", "Copy".blue().bold(), from.yellow(), to.yellow());

    if !report.created.is_empty() {
        println!();
        for item in &report.created {
            println!(
                "  {} {} {} ({} -> {})",
                "+".green(),
                item.object_type,
                item.name,
                item.source_id,
                item.target_id
            );
        }
    }
    if !report.linked.is_empty() {
        println!();
        println!("{}", "Linked back-references:".bold());
        for item in &report.linked {
            println!("  {} {} {}", "~".cyan(), item.key, item.name);
        }
    }
    print_skipped(&report.skipped);
    print_failures(&report.failed);

    println!();
    println!(
        "{} {} created, {} skipped, {} failed",
        if report.failed.is_empty() { "OK".green().bold() } else { "!!".yellow().bold() },
        report.created.len(),
        report.skipped.len(),
        report.failed.len()
    );
    println!("   Mapping: {}", report.mapping_file.dimmed());
}
