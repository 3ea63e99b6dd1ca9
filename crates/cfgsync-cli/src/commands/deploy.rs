//! Deploy command implementation

use cfgsync_core::{DeployAction, DeployEngine, DeployOptions, DeployReport, IdMapping, RemoteClient};
use colored::Colorize;

use super::{finish, print_failures, print_json, print_skipped};
use crate::context::Workspace;
use crate::error::Result;

/// Run the deploy command
///
/// With `--from`, ids are translated through that tenant's mapping to the
/// target; otherwise through the mapping of the tenant the workspace was
/// pulled from.
pub async fn run_deploy(
    ws: &Workspace,
    from: Option<&str>,
    to: &str,
    dry_run: bool,
    force: bool,
    json: bool,
) -> Result<()> {
    let target = ws.remote(Some(to))?;
    let mut engine = DeployEngine::new(ws.root.clone(), &target)
        .with_retry(ws.retry())
        .with_concurrency(ws.config.concurrency)
        .with_cancellation(ws.cancel());
    if let Some(from) = from {
        engine = engine.with_mapping(IdMapping::load_or_new(&ws.root, from, &target.tenant().name)?);
    }

    let report = engine.deploy(DeployOptions { dry_run, force }).await?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, to);
    }
    finish(report.failed.len(), report.cancelled)
}

fn print_report(report: &DeployReport, to: &str) {
    let title = if report.dry_run { "Deploy plan (dry run)" } else { "Deploy" };
    println!("{} {}", title.blue().bold(), to.yellow());
    println!();

    for planned in &report.planned {
        let marker = match planned.action {
            DeployAction::Create => "+".green(),
            DeployAction::Update => "~".yellow(),
            DeployAction::Skip => "?".red(),
            DeployAction::Unchanged => continue,
        };
        let target = planned
            .target_id
            .map(|id| format!(" -> {id}"))
            .unwrap_or_default();
        let reason = planned
            .reason
            .as_deref()
            .map(|r| format!(" ({r})").dimmed().to_string())
            .unwrap_or_default();
        println!("  {} {}{} {}{}", marker, planned.key, target, planned.name, reason);
    }

    if !report.dry_run {
        for item in &report.created {
            println!(
                "  {} {} {} created as {}",
                "+".green(),
                item.object_type,
                item.name,
                item.target_id
            );
        }
    }
    print_skipped(&report.skipped);
    print_failures(&report.failed);

    println!();
    println!(
        "{} to create, {} to update, {} unchanged, {} skipped, {} failed",
        report.count(DeployAction::Create),
        report.count(DeployAction::Update),
        report.count(DeployAction::Unchanged),
        report.count(DeployAction::Skip),
        report.failed.len()
    );
    if report.dry_run {
        println!("Run {} without --dry-run to apply.", "cfgsync deploy".cyan());
    } else {
        println!("   Mapping: {}", report.mapping_file.dimmed());
    }
}
