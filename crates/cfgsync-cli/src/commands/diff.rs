//! Diff command implementation
//!
//! Classifies every object against its tenant without changing anything.

use cfgsync_core::{ChangeState, DiffRecord, DiffReport};
use colored::{ColoredString, Colorize};
use serde_json::json;

use super::{finish, print_failures, print_json, scope_for};
use crate::context::Workspace;
use crate::error::Result;

/// Run the diff command
pub async fn run_diff(ws: &Workspace, tenant: Option<&str>, workspace_id: Option<u64>, json: bool) -> Result<()> {
    let remote = ws.remote(tenant)?;
    let report = ws.sync_engine().diff(&remote, scope_for(ws, workspace_id)).await?;

    if json {
        print_json(&json!({
            "has_changes": report.has_changes(),
            "summary": report.summary(),
            "records": report.records,
            "corrupt": report.corrupt,
            "failed": report.failed,
        }))?;
    } else {
        print_report(&report);
    }
    finish(report.failed.len(), false)
}

fn marker(state: ChangeState) -> ColoredString {
    match state {
        ChangeState::Unchanged => " ".normal(),
        ChangeState::LocalModified => "M".yellow(),
        ChangeState::RemoteModified => "R".cyan(),
        ChangeState::Conflict => "C".red().bold(),
        ChangeState::LocalOnly => "+".green(),
        ChangeState::RemoteOnly => "-".blue(),
    }
}

fn print_record(record: &DiffRecord) {
    let note = record
        .note
        .as_deref()
        .map(|n| format!(" ({n})").dimmed().to_string())
        .unwrap_or_default();
    println!(
        "  {} {} {} {}{}",
        marker(record.state),
        record.key,
        record.name,
        record.state.to_string().dimmed(),
        note
    );
}

fn print_report(report: &DiffReport) {
    if !report.has_changes() {
        println!(
            "{} No changes. {} objects match the tenant.",
            "OK".green().bold(),
            report.records.len()
        );
        return;
    }

    println!("{}", "Diff".blue().bold());
    println!();
    for record in report.records.iter().filter(|r| r.state != ChangeState::Unchanged) {
        print_record(record);
    }

    if !report.corrupt.is_empty() {
        println!();
        println!("{}", "Unreadable local files:".red().bold());
        for file in &report.corrupt {
            println!("  {} {}: {}", "!".red(), file.path, file.message);
        }
    }
    print_failures(&report.failed);

    let summary = report.summary();
    println!();
    println!(
        "{} unchanged, {} local, {} remote, {} conflicts, {} local only, {} remote only",
        summary.unchanged,
        summary.local_modified,
        summary.remote_modified,
        summary.conflict.to_string().red(),
        summary.local_only,
        summary.remote_only
    );
    if summary.conflict > 0 {
        println!(
            "Conflicts block {}. Resolve them locally or use {}.",
            "cfgsync push".cyan(),
            "--force".cyan()
        );
    }
}
