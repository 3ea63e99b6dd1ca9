//! Configuration resolution and tenant contexts
//!
//! Configuration is loaded and merged from these sources (later sources override earlier):
//!
//! 1. **Global defaults** - `<config_dir>/cfgsync/config.toml`
//! 2. **Workspace config** - `.cfgsync/config.toml`
//! 3. **Local overrides** - `.cfgsync/config.local.toml` (git-ignored)
//!
//! # Example
//!
//! ```ignore
//! use cfgsync_core::config::ConfigResolver;
//! use cfgsync_fs::NormalizedPath;
//!
//! let resolver = ConfigResolver::new(NormalizedPath::new("/path/to/workspace"));
//! let config = resolver.resolve()?;
//! let prod = resolver.tenant_context(&config, config.default_tenant()?)?;
//! ```

mod manifest;
mod resolver;
mod tenant;

pub use manifest::{FetchSection, Manifest, RetrySection, TenantSection, WorkspaceSection};
pub use resolver::{ConfigResolver, DEFAULT_CONCURRENCY, ResolvedConfig, TenantConfig};
pub use tenant::{TenantContext, default_token_env};
