//! Command implementations for cfgsync-cli

pub mod compare;
pub mod copy;
pub mod deploy;
pub mod diff;
pub mod init;
pub mod pull;
pub mod push;

pub use compare::run_compare;
pub use copy::run_copy;
pub use deploy::run_deploy;
pub use diff::run_diff;
pub use init::run_init;
pub use pull::run_pull;
pub use push::run_push;

use cfgsync_core::{ItemFailure, PullScope, SkippedItem};
use colored::Colorize;
use serde::Serialize;

use crate::context::Workspace;
use crate::error::{CliError, Result};

/// `--workspace`, else the configured workspace, else the whole tenant.
pub(crate) fn scope_for(ws: &Workspace, workspace_id: Option<u64>) -> PullScope {
    workspace_id
        .or(ws.config.workspace_id)
        .map_or(PullScope::Tenant, PullScope::Workspace)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_skipped(skipped: &[SkippedItem]) {
    if skipped.is_empty() {
        return;
    }
    println!();
    println!("{}", "Skipped:".yellow().bold());
    for item in skipped {
        println!("  {} {} {} ({})", "?".yellow(), item.key, item.name, item.reason.dimmed());
    }
}

pub(crate) fn print_failures(failed: &[ItemFailure]) {
    if failed.is_empty() {
        return;
    }
    println!();
    println!("{}", "Failed:".red().bold());
    for failure in failed {
        let id = failure.id.map(|id| format!(" {id}")).unwrap_or_default();
        let field = failure
            .field
            .as_deref()
            .map(|f| format!(" [{f}]"))
            .unwrap_or_default();
        println!(
            "  {} {}{} {}{}: {}",
            "!".red(),
            failure.object_type,
            id,
            failure.name,
            field,
            failure.message
        );
    }
}

/// Exit non-zero when anything failed or the run was interrupted.
pub(crate) fn finish(failed: usize, cancelled: bool) -> Result<()> {
    if cancelled {
        return Err(CliError::user("Interrupted; rerun to continue where it stopped"));
    }
    if failed > 0 {
        return Err(CliError::user(format!(
            "{failed} object{} failed",
            if failed == 1 { "" } else { "s" }
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reports_failures() {
        assert!(finish(0, false).is_ok());
        assert_eq!(finish(1, false).unwrap_err().to_string(), "1 object failed");
        assert_eq!(finish(3, false).unwrap_err().to_string(), "3 objects failed");
        assert!(finish(0, true).unwrap_err().to_string().contains("Interrupted"));
    }
}
