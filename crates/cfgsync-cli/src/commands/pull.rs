//! Pull command implementation

use cfgsync_core::{PullOptions, PullReport, PullScope};
use colored::Colorize;

use super::{finish, print_failures, print_json, print_skipped, scope_for};
use crate::context::Workspace;
use crate::error::Result;

/// Run the pull command
pub async fn run_pull(
    ws: &Workspace,
    tenant: Option<&str>,
    workspace_id: Option<u64>,
    overwrite_local: bool,
    json: bool,
) -> Result<()> {
    let remote = ws.remote(tenant)?;
    let scope = scope_for(ws, workspace_id);
    let report = ws
        .sync_engine()
        .pull(&remote, scope, PullOptions { overwrite_local })
        .await?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, scope);
    }
    finish(report.failed.len(), report.cancelled)
}

fn print_report(report: &PullReport, scope: PullScope) {
    let scope = match scope {
        PullScope::Tenant => "whole tenant".to_string(),
        PullScope::Workspace(id) => format!("workspace {id}"),
    };
    println!("{} {}", "Pull".blue().bold(), scope.yellow());

    if !report.written.is_empty() {
        println!();
        for item in &report.written {
            println!("  {} {} {}", "<".green(), item.key, item.name);
        }
    }
    print_skipped(&report.skipped);
    print_failures(&report.failed);

    println!();
    println!(
        "{} {} written, {} unchanged, {} skipped, {} failed",
        if report.is_clean() { "OK".green().bold() } else { "!!".yellow().bold() },
        report.written.len(),
        report.unchanged.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.skipped.is_empty() {
        println!(
            "Local edits were kept. Push them, or rerun with {} to discard them.",
            "--overwrite-local".cyan()
        );
    }
}
