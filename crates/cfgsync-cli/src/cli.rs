//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cfgsync - Mirror, diff, push, and replicate remote configuration objects
#[derive(Parser, Debug)]
#[command(name = "cfgsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace root (default: nearest directory containing .cfgsync/)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Initialize a workspace bound to a tenant
    ///
    /// Creates .cfgsync/config.toml in the current directory (or --root).
    ///
    /// Examples:
    ///   cfgsync init --tenant prod --base-url https://prod.example.com/api/v1
    ///   cfgsync init --tenant prod --base-url URL --workspace-id 111
    Init {
        /// Tenant name used in commands and mapping file names
        #[arg(long)]
        tenant: String,

        /// Base URL of the tenant's API
        #[arg(long)]
        base_url: String,

        /// Environment variable holding the tenant's token
        #[arg(long)]
        token_env: Option<String>,

        /// Default workspace for pull, diff, and copy
        #[arg(long)]
        workspace_id: Option<u64>,
    },

    /// Mirror remote objects into the workspace
    Pull {
        /// Tenant to pull from (default: the workspace tenant)
        #[arg(long)]
        tenant: Option<String>,

        /// Pull one workspace and its objects instead of the configured scope
        #[arg(long, value_name = "ID")]
        workspace: Option<u64>,

        /// Replace local edits and unreadable files with the remote version
        #[arg(long)]
        overwrite_local: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Classify every object as unchanged, modified, conflicting, or one-sided
    Diff {
        /// Tenant to compare against (default: the workspace tenant)
        #[arg(long)]
        tenant: Option<String>,

        /// Restrict to one workspace and its objects
        #[arg(long, value_name = "ID")]
        workspace: Option<u64>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Send local edits and new local objects to the tenant
    Push {
        /// Tenant to push to (default: the workspace tenant)
        #[arg(long)]
        tenant: Option<String>,

        /// Show the plan without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Overwrite conflicting remote changes
        #[arg(long)]
        force: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Replicate an object graph into another tenant
    ///
    /// Examples:
    ///   cfgsync copy --to staging --workspace 111
    ///   cfgsync copy --from prod --to staging
    Copy {
        /// Target tenant
        #[arg(long)]
        to: String,

        /// Source tenant (default: the workspace tenant)
        #[arg(long)]
        from: Option<String>,

        /// Copy one workspace (default: the configured workspace, else everything)
        #[arg(long, value_name = "ID")]
        workspace: Option<u64>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Compare two pulled workspaces field by field
    Compare {
        /// Workspace directory holding the source objects
        source_dir: PathBuf,

        /// Workspace directory holding the target objects
        target_dir: PathBuf,

        /// ID mapping file pairing source ids with target ids
        #[arg(long, value_name = "FILE")]
        mapping: Option<PathBuf>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Create or update the workspace's objects in a target tenant
    Deploy {
        /// Target tenant
        #[arg(long)]
        to: String,

        /// Tenant the local objects were pulled from (selects the mapping file)
        #[arg(long)]
        from: Option<String>,

        /// Show the plan without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Overwrite target objects changed since cfgsync last wrote them
        #[arg(long)]
        force: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
