//! Init command implementation
//!
//! Binds a directory to a tenant by writing `.cfgsync/config.toml`.

use std::path::Path;

use cfgsync_core::config::{Manifest, TenantSection, WorkspaceSection, default_token_env};
use cfgsync_fs::{NormalizedPath, WorkspacePath, io};
use colored::Colorize;

use crate::error::{CliError, Result};

const GITIGNORE: &str = "config.local.toml\n";

/// Run the init command
pub fn run_init(
    path: &Path,
    tenant: &str,
    base_url: &str,
    token_env: Option<&str>,
    workspace_id: Option<u64>,
) -> Result<()> {
    println!(
        "{} Initializing workspace for tenant {}...",
        "=>".blue().bold(),
        tenant.cyan()
    );

    let token_env = token_env.map_or_else(|| default_token_env(tenant), str::to_string);
    let config_path = init_workspace(path, tenant, base_url, &token_env, workspace_id)?;

    println!("   Config: {}", config_path.as_str().yellow());
    println!("   Token:  read from {}", token_env.cyan());
    println!("{} Workspace initialized!", "OK".green().bold());
    println!();
    println!("Run {} to mirror the tenant.", "cfgsync pull".cyan());
    Ok(())
}

/// Write the workspace configuration, refusing to overwrite an existing one.
pub fn init_workspace(
    path: &Path,
    tenant: &str,
    base_url: &str,
    token_env: &str,
    workspace_id: Option<u64>,
) -> Result<NormalizedPath> {
    if tenant.trim().is_empty() {
        return Err(CliError::user("Tenant name must not be empty"));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(CliError::user(format!(
            "Invalid base URL '{base_url}'. Must start with http:// or https://"
        )));
    }

    let root = NormalizedPath::new(path);
    let config_path = root.join(WorkspacePath::Config.as_str());
    if config_path.exists() {
        return Err(CliError::user(format!(
            "{} already exists; edit it to add tenants",
            config_path
        )));
    }

    let mut manifest = Manifest {
        workspace: WorkspaceSection {
            tenant: Some(tenant.to_string()),
            workspace_id,
        },
        ..Manifest::default()
    };
    manifest.tenants.insert(
        tenant.to_string(),
        TenantSection {
            base_url: Some(base_url.trim_end_matches('/').to_string()),
            token_env: Some(token_env.to_string()),
        },
    );

    io::write_text(&config_path, &manifest.to_toml()?)?;
    io::write_text(
        &root.join(WorkspacePath::StateDir.as_str()).join(".gitignore"),
        GITIGNORE,
    )?;
    tracing::info!(path = %config_path, tenant, "Initialized workspace");
    Ok(config_path)
}
