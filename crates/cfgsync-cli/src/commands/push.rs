//! Push command implementation

use cfgsync_core::sync::PushAction;
use cfgsync_core::{PushOptions, PushReport, PushStatus};
use colored::Colorize;

use super::{finish, print_failures, print_json, print_skipped};
use crate::context::Workspace;
use crate::error::{CliError, Result};

/// Run the push command
pub async fn run_push(ws: &Workspace, tenant: Option<&str>, dry_run: bool, force: bool, json: bool) -> Result<()> {
    let remote = ws.remote(tenant)?;
    let report = ws
        .sync_engine()
        .push(&remote, PushOptions { dry_run, force })
        .await?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if report.status == PushStatus::Rejected {
        return Err(CliError::user(format!(
            "Push rejected: {} object(s) changed on both sides",
            report.conflicts.len()
        )));
    }
    finish(report.failed.len(), report.cancelled)
}

fn print_plan(report: &PushReport) {
    for planned in &report.planned {
        let marker = match planned.action {
            PushAction::Create => "+".green(),
            PushAction::Update => "~".yellow(),
        };
        println!("  {} {} {} {}", marker, planned.key, planned.name, planned.state.to_string().dimmed());
    }
}

fn print_report(report: &PushReport) {
    match report.status {
        PushStatus::NothingToPush => {
            println!("{} Nothing to push.", "OK".green().bold());
            print_skipped(&report.skipped);
            print_failures(&report.failed);
        }
        PushStatus::Rejected => {
            println!("{}", "Push rejected: conflicts".red().bold());
            println!();
            for conflict in &report.conflicts {
                println!("  {} {} {}", "C".red().bold(), conflict.key, conflict.name);
            }
            println!();
            println!(
                "Run {} to inspect, then resolve locally or rerun with {}.",
                "cfgsync diff".cyan(),
                "--force".cyan()
            );
        }
        PushStatus::DryRun => {
            println!("{}", "Push plan (dry run)".blue().bold());
            println!();
            print_plan(report);
            print_skipped(&report.skipped);
            println!();
            println!("Run {} to apply.", "cfgsync push".cyan());
        }
        PushStatus::Completed => {
            println!("{}", "Push".blue().bold());
            println!();
            for item in &report.created {
                println!(
                    "  {} {} {} (local {} is now {})",
                    "+".green(),
                    item.object_type,
                    item.name,
                    item.source_id,
                    item.target_id
                );
            }
            for item in &report.updated {
                println!("  {} {} {}", "~".yellow(), item.key, item.name);
            }
            print_skipped(&report.skipped);
            print_failures(&report.failed);
            println!();
            println!(
                "{} {} created, {} updated, {} failed",
                if report.failed.is_empty() { "OK".green().bold() } else { "!!".yellow().bold() },
                report.created.len(),
                report.updated.len(),
                report.failed.len()
            );
        }
    }
}
