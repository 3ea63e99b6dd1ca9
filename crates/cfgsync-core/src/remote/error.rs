//! Errors reported by remote clients

use serde::Serialize;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network hiccup, rate limit, or 5xx; safe to retry idempotent calls
    #[error("Transient remote failure: {message}")]
    Transient { message: String },

    /// The call exceeded its per-call timeout
    #[error("Remote call timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Target-side validation rejected the payload
    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The base URL cannot be reached at all
    #[error("Unreachable: {message}")]
    Unreachable { message: String },

    /// Any other non-success status
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Response body was not what the client expected
    #[error("Invalid response: {message}")]
    Decode { message: String },
}

impl RemoteError {
    /// Whether an idempotent call may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Whether the whole operation must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transient { .. } => FailureKind::Transient,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Validation { .. } => FailureKind::Validation,
            Self::Unauthorized { .. } => FailureKind::Unauthorized,
            Self::Unreachable { .. } => FailureKind::Unreachable,
            Self::Rejected { .. } => FailureKind::Rejected,
            Self::Decode { .. } => FailureKind::Decode,
        }
    }

    /// Offending field of a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Category of a per-object failure in an operation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Timeout,
    NotFound,
    Validation,
    Unauthorized,
    Unreachable,
    Rejected,
    Decode,
    /// Local file could not be read
    CorruptLocal,
    /// Local write (file, ledger, mapping) failed
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let transient = RemoteError::Transient {
            message: "502".into(),
        };
        assert!(transient.is_transient());
        assert!(!transient.is_fatal());
        assert!(RemoteError::Timeout { millis: 10 }.is_transient());

        let unreachable = RemoteError::Unreachable {
            message: "dns".into(),
        };
        assert!(unreachable.is_fatal());
        assert!(!unreachable.is_transient());

        let validation = RemoteError::Validation {
            field: "schema".into(),
            message: "Invalid hyperlink".into(),
        };
        assert_eq!(validation.field(), Some("schema"));
        assert_eq!(validation.kind(), FailureKind::Validation);
    }
}
