//! Manifest parsing for `config.toml` files
//!
//! A manifest is one configuration layer. Every field is optional so that
//! layers can be merged; [`ResolvedConfig`](super::ResolvedConfig) applies
//! defaults once all layers are combined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;

/// `[workspace]`: what this directory mirrors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSection {
    /// Tenant the workspace is pulled from and pushed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Restrict pull/diff to one workspace's object graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<u64>,
}

/// `[tenants.<name>]`: how to reach a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

/// `[retry]`: remote call retry and timeout settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

/// `[fetch]`: read parallelism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// One parsed configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub workspace: WorkspaceSection,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tenants: BTreeMap<String, TenantSection>,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub fetch: FetchSection,
}

impl Manifest {
    /// Parse a manifest from TOML content
    ///
    /// # Example
    ///
    /// ```
    /// use cfgsync_core::config::Manifest;
    ///
    /// let manifest = Manifest::parse(r#"
    /// [workspace]
    /// tenant = "prod"
    ///
    /// [tenants.prod]
    /// base_url = "https://prod.example.com/api/v1"
    /// "#).unwrap();
    ///
    /// assert_eq!(manifest.workspace.tenant.as_deref(), Some("prod"));
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        Ok(manifest)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another manifest into this one
    ///
    /// Values set in `other` win; tenants are merged field by field so a
    /// local layer can override just a `token_env`.
    pub fn merge(&mut self, other: &Manifest) {
        overlay(&mut self.workspace.tenant, &other.workspace.tenant);
        overlay(&mut self.workspace.workspace_id, &other.workspace.workspace_id);

        for (name, tenant) in &other.tenants {
            let base = self.tenants.entry(name.clone()).or_default();
            overlay(&mut base.base_url, &tenant.base_url);
            overlay(&mut base.token_env, &tenant.token_env);
        }

        overlay(&mut self.retry.max_attempts, &other.retry.max_attempts);
        overlay(&mut self.retry.initial_interval_ms, &other.retry.initial_interval_ms);
        overlay(&mut self.retry.max_interval_ms, &other.retry.max_interval_ms);
        overlay(&mut self.retry.multiplier, &other.retry.multiplier);
        overlay(&mut self.retry.call_timeout_secs, &other.retry.call_timeout_secs);

        overlay(&mut self.fetch.concurrency, &other.fetch.concurrency);
    }
}

fn overlay<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
    if other.is_some() {
        base.clone_from(other);
    }
}
