//! Configuration resolution with hierarchical merge
//!
//! Layers, later overriding earlier:
//! 1. Global defaults (`<config_dir>/cfgsync/config.toml`)
//! 2. Workspace config (`.cfgsync/config.toml`), required
//! 3. Local overrides (`.cfgsync/config.local.toml`), meant to be git-ignored

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use cfgsync_fs::{NormalizedPath, WorkspacePath};
use serde::Deserialize;

use super::manifest::Manifest;
use super::tenant::{TenantContext, default_token_env};
use crate::remote::RetryPolicy;
use crate::{Error, Result};

/// Default number of parallel reads.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A declared tenant after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub base_url: String,
    pub token_env: String,
}

/// Effective configuration for a workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub tenant: Option<String>,
    pub workspace_id: Option<u64>,
    pub tenants: BTreeMap<String, TenantConfig>,
    pub retry: RetryPolicy,
    pub concurrency: usize,
}

impl ResolvedConfig {
    fn from_manifest(manifest: Manifest) -> Result<Self> {
        let mut tenants = BTreeMap::new();
        for (name, section) in manifest.tenants {
            let base_url = section.base_url.ok_or_else(|| Error::InvalidConfig {
                message: format!("tenant '{name}' has no base_url"),
            })?;
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(Error::InvalidConfig {
                    message: format!("tenant '{name}' base_url must be http(s): {base_url}"),
                });
            }
            let token_env = section
                .token_env
                .unwrap_or_else(|| default_token_env(&name));
            tenants.insert(name, TenantConfig { base_url, token_env });
        }

        if let Some(tenant) = &manifest.workspace.tenant
            && !tenants.contains_key(tenant)
        {
            return Err(Error::UnknownTenant {
                name: tenant.clone(),
            });
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: manifest.retry.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_interval: manifest
                .retry
                .initial_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_interval),
            max_interval: manifest
                .retry
                .max_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_interval),
            multiplier: manifest.retry.multiplier.unwrap_or(defaults.multiplier),
            call_timeout: manifest
                .retry
                .call_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
        };

        Ok(Self {
            tenant: manifest.workspace.tenant,
            workspace_id: manifest.workspace.workspace_id,
            tenants,
            retry,
            concurrency: manifest.fetch.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1),
        })
    }

    /// The workspace's own tenant, or `InvalidConfig` if none is configured.
    pub fn default_tenant(&self) -> Result<&str> {
        self.tenant.as_deref().ok_or_else(|| Error::InvalidConfig {
            message: "no [workspace] tenant configured".into(),
        })
    }
}

/// `credentials.toml`: `[<tenant>] token = "..."`.
#[derive(Debug, Default, Deserialize)]
struct CredentialsFile(BTreeMap<String, CredentialEntry>);

#[derive(Debug, Deserialize)]
struct CredentialEntry {
    token: String,
}

/// Resolves configuration and tenant credentials for a workspace.
pub struct ConfigResolver {
    /// Workspace root directory
    root: NormalizedPath,

    /// Override for the global config directory (used for testing).
    /// When `None`, the platform-appropriate directory is used via `dirs::config_dir()`.
    global_config_dir_override: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            global_config_dir_override: None,
        }
    }

    /// Create a resolver with a custom global config directory.
    pub fn with_global_config_dir(root: NormalizedPath, global_config_dir: PathBuf) -> Self {
        Self {
            root,
            global_config_dir_override: Some(global_config_dir),
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("cfgsync"))
    }

    /// Merge all layers.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` when the workspace has no `.cfgsync/config.toml`;
    /// parse errors for invalid TOML in any layer; `InvalidConfig` /
    /// `UnknownTenant` for inconsistent settings.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let mut manifest = Manifest::default();

        // Layer 1 - Global defaults
        if let Some(global_dir) = self.global_config_dir() {
            let global_config_path = global_dir.join("config.toml");
            if global_config_path.is_file() {
                tracing::debug!(?global_config_path, "Loading global config (layer 1)");
                let content = fs::read_to_string(&global_config_path)?;
                manifest.merge(&Manifest::parse(&content)?);
            }
        }

        // Layer 2 - Workspace config
        let workspace_config_path = self.root.join(WorkspacePath::Config.as_str());
        if !workspace_config_path.is_file() {
            return Err(Error::ConfigNotFound {
                path: workspace_config_path.to_native(),
            });
        }
        tracing::debug!(path = %workspace_config_path, "Loading workspace config (layer 2)");
        let content = fs::read_to_string(workspace_config_path.to_native())?;
        manifest.merge(&Manifest::parse(&content)?);

        // Layer 3 - Local overrides
        let local_config_path = self.root.join(WorkspacePath::LocalConfig.as_str());
        if local_config_path.is_file() {
            tracing::debug!(path = %local_config_path, "Loading local overrides (layer 3)");
            let content = fs::read_to_string(local_config_path.to_native())?;
            manifest.merge(&Manifest::parse(&content)?);
        }

        ResolvedConfig::from_manifest(manifest)
    }

    /// Build the session context for a declared tenant.
    ///
    /// The token comes from the tenant's `token_env` variable, else from
    /// `<config_dir>/cfgsync/credentials.toml`. A context without a token
    /// is returned when neither has one; operations reject it when they
    /// need to talk to the tenant.
    pub fn tenant_context(&self, config: &ResolvedConfig, name: &str) -> Result<TenantContext> {
        let tenant = config.tenants.get(name).ok_or_else(|| Error::UnknownTenant {
            name: name.to_string(),
        })?;

        let context = TenantContext::new(name, &tenant.base_url).with_credential_hint(format!(
            "{} or [{}] token in credentials.toml",
            tenant.token_env, name
        ));

        if let Ok(token) = std::env::var(&tenant.token_env)
            && !token.trim().is_empty()
        {
            return Ok(context.with_token(token.trim()));
        }

        match self.stored_token(name)? {
            Some(token) => Ok(context.with_token(token)),
            None => {
                tracing::debug!(tenant = name, "No credentials found for tenant");
                Ok(context)
            }
        }
    }

    fn stored_token(&self, name: &str) -> Result<Option<String>> {
        let Some(dir) = self.global_config_dir() else {
            return Ok(None);
        };
        let path = dir.join("credentials.toml");
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let CredentialsFile(mut entries) = toml::from_str(&content)?;
        Ok(entries.remove(name).map(|e| e.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        workspace: TempDir,
        global: TempDir,
    }

    impl Fixture {
        fn new(config: &str) -> Self {
            let workspace = TempDir::new().unwrap();
            fs::create_dir_all(workspace.path().join(".cfgsync")).unwrap();
            fs::write(workspace.path().join(".cfgsync/config.toml"), config).unwrap();
            Self {
                workspace,
                global: TempDir::new().unwrap(),
            }
        }

        fn resolver(&self) -> ConfigResolver {
            ConfigResolver::with_global_config_dir(
                NormalizedPath::new(self.workspace.path()),
                self.global.path().to_path_buf(),
            )
        }
    }

    const BASIC: &str = r#"
[workspace]
tenant = "prod"

[tenants.prod]
base_url = "https://prod.example.com/api/v1"
token_env = "CFGSYNC_RESOLVER_TEST_UNSET_VAR"
"#;

    #[test]
    fn missing_workspace_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let resolver = ConfigResolver::with_global_config_dir(
            NormalizedPath::new(temp.path()),
            temp.path().join("global"),
        );
        assert!(matches!(resolver.resolve(), Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn defaults_apply_after_merge() {
        let fixture = Fixture::new(BASIC);
        let config = fixture.resolver().resolve().unwrap();
        assert_eq!(config.default_tenant().unwrap(), "prod");
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn global_and_local_layers_are_merged() {
        let fixture = Fixture::new(BASIC);
        fs::write(
            fixture.global.path().join("config.toml"),
            "[retry]\nmax_attempts = 9\n\n[fetch]\nconcurrency = 3\n",
        )
        .unwrap();
        fs::write(
            fixture.workspace.path().join(".cfgsync/config.local.toml"),
            "[fetch]\nconcurrency = 1\n",
        )
        .unwrap();

        let config = fixture.resolver().resolve().unwrap();
        assert_eq!(config.retry.max_attempts, 9);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn undeclared_workspace_tenant_is_rejected() {
        let fixture = Fixture::new("[workspace]\ntenant = \"ghost\"\n");
        assert!(matches!(
            fixture.resolver().resolve(),
            Err(Error::UnknownTenant { .. })
        ));
    }

    #[test]
    fn tenant_without_base_url_is_invalid() {
        let fixture = Fixture::new("[tenants.prod]\ntoken_env = \"X\"\n");
        assert!(matches!(
            fixture.resolver().resolve(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn token_falls_back_to_credentials_file() {
        let fixture = Fixture::new(BASIC);
        let resolver = fixture.resolver();
        let config = resolver.resolve().unwrap();

        let context = resolver.tenant_context(&config, "prod").unwrap();
        assert!(!context.has_credentials());
        assert!(context.require_credentials().is_err());

        fs::write(
            fixture.global.path().join("credentials.toml"),
            "[prod]\ntoken = \"from-file\"\n",
        )
        .unwrap();
        let context = resolver.tenant_context(&config, "prod").unwrap();
        assert_eq!(context.token(), Some("from-file"));
    }

    #[test]
    fn unknown_tenant_context_is_error() {
        let fixture = Fixture::new(BASIC);
        let resolver = fixture.resolver();
        let config = resolver.resolve().unwrap();
        assert!(matches!(
            resolver.tenant_context(&config, "staging"),
            Err(Error::UnknownTenant { .. })
        ));
    }
}
