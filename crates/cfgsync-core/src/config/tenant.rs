//! Explicit tenant session context
//!
//! Every operation receives the tenant(s) it talks to as values; there is no
//! process-wide "active tenant".

use std::fmt;

use crate::model::ObjectRef;
use crate::reference::reference_url;
use crate::{Error, Result};

/// Connection details for one tenant of the configuration service.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Name the tenant is declared under in the configuration
    pub name: String,
    /// API root, e.g. `https://acme.example.com/api/v1`
    pub base_url: String,
    token: Option<String>,
    /// Where a token is expected, used in error messages
    credential_hint: String,
}

impl TenantContext {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let name = name.into();
        let credential_hint = default_token_env(&name);
        Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            credential_hint,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_credential_hint(mut self, hint: impl Into<String>) -> Self {
        self.credential_hint = hint.into();
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_credentials(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The token, or [`Error::MissingCredentials`].
    pub fn require_credentials(&self) -> Result<&str> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(Error::MissingCredentials {
                tenant: self.name.clone(),
                hint: self.credential_hint.clone(),
            }),
        }
    }

    /// Canonical URL of an object in this tenant.
    pub fn object_url(&self, key: ObjectRef) -> String {
        reference_url(&self.base_url, key)
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `CFGSYNC_TOKEN_<NAME>` with the name upper-cased and non-alphanumerics
/// replaced by `_`.
pub fn default_token_env(tenant: &str) -> String {
    let suffix: String = tenant
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("CFGSYNC_TOKEN_{suffix}")
}
