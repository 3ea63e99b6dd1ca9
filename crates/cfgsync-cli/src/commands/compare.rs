//! Compare command implementation
//!
//! Works on two pulled directories only; no tenant is contacted.

use std::path::Path;

use cfgsync_core::{Comparator, ComparisonReport, FieldChange, IdMapping, LocalStore};
use cfgsync_fs::NormalizedPath;
use colored::Colorize;
use serde_json::json;

use super::print_json;
use crate::error::{CliError, Result};

/// Run the compare command
pub fn run_compare(source_dir: &Path, target_dir: &Path, mapping: Option<&Path>, json: bool) -> Result<()> {
    for dir in [source_dir, target_dir] {
        if !dir.is_dir() {
            return Err(CliError::user(format!("{} is not a directory", dir.display())));
        }
    }

    let mut comparator = Comparator::new(
        LocalStore::new(NormalizedPath::new(source_dir)),
        LocalStore::new(NormalizedPath::new(target_dir)),
    );
    if let Some(path) = mapping {
        comparator = comparator.with_mapping(IdMapping::load_file(path, "source", "target")?);
    }
    let report = comparator.compare()?;

    if json {
        print_json(&json!({
            "identical": report.is_identical(),
            "report": report,
        }))?;
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_change(change: &FieldChange) {
    match change {
        FieldChange::Added { path, value } => println!("      {} {path}: {value}", "+".green()),
        FieldChange::Removed { path, value } => println!("      {} {path}: {value}", "-".red()),
        FieldChange::Modified { path, old, new } => {
            println!("      {} {path}: {} -> {}", "~".yellow(), old.to_string().red(), new.to_string().green())
        }
    }
}

fn print_report(report: &ComparisonReport) {
    if report.is_identical() {
        println!(
            "{} Identical. {} object pairs match.",
            "OK".green().bold(),
            report.pairs.len()
        );
        return;
    }

    let changed: Vec<_> = report.changed().collect();
    if !changed.is_empty() {
        println!("{}", "Changed:".yellow().bold());
        for pair in &changed {
            println!(
                "  {} {} {} -> {} {} ({:.0}% similar)",
                "~".yellow(),
                pair.object_type,
                pair.source_id,
                pair.target_id,
                pair.source_name,
                pair.diff.similarity * 100.0
            );
            for change in &pair.diff.changes {
                print_change(change);
            }
        }
    }
    if !report.source_only.is_empty() {
        println!();
        println!("{}", "Only in source:".bold());
        for item in &report.source_only {
            println!("  {} {} {}", "<".green(), item.key, item.name);
        }
    }
    if !report.target_only.is_empty() {
        println!();
        println!("{}", "Only in target:".bold());
        for item in &report.target_only {
            println!("  {} {} {}", ">".blue(), item.key, item.name);
        }
    }
    if !report.corrupt.is_empty() {
        println!();
        println!("{}", "Unreadable files:".red().bold());
        for file in &report.corrupt {
            println!("  {} {}: {}", "!".red(), file.path, file.message);
        }
    }

    println!();
    println!(
        "{} changed, {} source only, {} target only",
        changed.len(),
        report.source_only.len(),
        report.target_only.len()
    );
}
