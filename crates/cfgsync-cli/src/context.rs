//! Workspace context detection
//!
//! Commands work from anywhere inside a workspace: the root is the nearest
//! ancestor directory containing `.cfgsync/`, unless `--root` names it.

use std::path::{Path, PathBuf};

use cfgsync_core::config::{ConfigResolver, ResolvedConfig};
use cfgsync_core::remote::HttpRemote;
use cfgsync_core::{RetryPolicy, SyncEngine, TenantContext};
use cfgsync_fs::{NormalizedPath, WorkspacePath};
use tokio_util::sync::CancellationToken;

use crate::error::{CliError, Result};

/// Walk up from `start` to the directory holding `.cfgsync/`.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(WorkspacePath::StateDir.as_str()).is_dir())
        .map(Path::to_path_buf)
}

/// The workspace root for this invocation.
pub fn resolve_root(explicit: Option<&Path>) -> Result<NormalizedPath> {
    if let Some(root) = explicit {
        return Ok(NormalizedPath::new(root));
    }
    let cwd = std::env::current_dir()?;
    find_root(&cwd).map(NormalizedPath::new).ok_or_else(|| {
        CliError::user(format!(
            "{} is not inside a cfgsync workspace (no {} found); run `cfgsync init` first",
            cwd.display(),
            WorkspacePath::StateDir.as_str()
        ))
    })
}

/// An opened workspace with its resolved configuration.
pub struct Workspace {
    pub root: NormalizedPath,
    pub config: ResolvedConfig,
    resolver: ConfigResolver,
    cancel: CancellationToken,
}

impl Workspace {
    pub fn open(explicit_root: Option<&Path>, cancel: CancellationToken) -> Result<Self> {
        let root = resolve_root(explicit_root)?;
        let resolver = ConfigResolver::new(root.clone());
        let config = resolver.resolve()?;
        tracing::debug!(root = %root, tenant = ?config.tenant, "Opened workspace");
        Ok(Self {
            root,
            config,
            resolver,
            cancel,
        })
    }

    /// Context for `name`, or for the workspace tenant.
    pub fn tenant(&self, name: Option<&str>) -> Result<TenantContext> {
        let name = match name {
            Some(name) => name,
            None => self.config.default_tenant()?,
        };
        Ok(self.resolver.tenant_context(&self.config, name)?)
    }

    pub fn remote(&self, name: Option<&str>) -> Result<HttpRemote> {
        Ok(HttpRemote::new(self.tenant(name)?)?)
    }

    pub fn retry(&self) -> RetryPolicy {
        self.config.retry.clone()
    }

    pub fn cancel(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sync_engine(&self) -> SyncEngine {
        SyncEngine::new(self.root.clone())
            .with_retry(self.retry())
            .with_concurrency(self.config.concurrency)
            .with_cancellation(self.cancel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgsync_test_utils::workspace::TestWorkspace;

    #[test]
    fn finds_root_from_nested_directory() {
        let ws = TestWorkspace::new();
        ws.init_cfgsync("prod", "https://prod.example.com/api/v1");
        let nested = ws.path("schemas/deeper");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_root(&nested).as_deref(), Some(ws.root()));
    }

    #[test]
    fn no_root_outside_a_workspace() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(find_root(dir.path()), None);
    }

    #[test]
    fn explicit_root_wins() {
        let root = resolve_root(Some(Path::new("/srv/config"))).unwrap();
        assert_eq!(root.as_str(), "/srv/config");
    }

    #[test]
    fn opens_configured_workspace() {
        let ws = TestWorkspace::new();
        ws.init_cfgsync("prod", "https://prod.example.com/api/v1");

        let opened = Workspace::open(Some(ws.root()), CancellationToken::new()).unwrap();
        let tenant = opened.tenant(None).unwrap();

        assert_eq!(tenant.name, "prod");
        assert_eq!(tenant.base_url, "https://prod.example.com/api/v1");
        assert!(matches!(
            opened.tenant(Some("staging")),
            Err(CliError::Core(cfgsync_core::Error::UnknownTenant { .. }))
        ));
    }
}
