// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the timecard sign-off service.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all sign-off crates and adapter traits.
#[derive(Debug, Error)]
pub enum SignoffError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Key management service errors (unreachable, access denied, malformed key).
    ///
    /// `transient` marks network-level failures that may succeed when retried.
    #[error("kms error: {message}")]
    Kms {
        message: String,
        transient: bool,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AEAD authentication failed: wrong key, wrong nonce, or corrupted bytes.
    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Vault errors other than tag verification (RNG failure, invalid UTF-8).
    #[error("vault error: {0}")]
    Vault(String),

    /// No credential row exists for the user and site.
    #[error("no credentials found for user {user_id} on site {site}")]
    CredentialNotFound { user_id: i64, site: String },

    /// The referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// The automation collaborator raised instead of returning an outcome.
    ///
    /// `kind` names the failure class (e.g. `TimeoutError`, `BrowserError`) and
    /// feeds the run classifier.
    #[error("{message}")]
    Automation { message: String, kind: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Task queue transport errors (malformed payload, lost entry).
    #[error("queue error: {0}")]
    Queue(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SignoffError {
    /// Whether the task infrastructure should retry the failed task.
    ///
    /// Only infrastructure failures qualify. Credential and classification
    /// failures will not succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { .. } | Self::Timeout { .. } | Self::Queue(_) => true,
            Self::Kms { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Whether the error means the stored credential cannot be used.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::CredentialNotFound { .. } | Self::UserNotFound(_))
    }

    /// A short type name for the error, used by the run classifier the way an
    /// exception class name would be.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Storage { .. } => "StorageError",
            Self::Kms { .. } => "KmsError",
            Self::AuthenticationFailure(_) => "AuthenticationFailure",
            Self::Vault(_) => "VaultError",
            Self::CredentialNotFound { .. } => "CredentialNotFound",
            Self::UserNotFound(_) => "UserNotFound",
            Self::Automation { kind, .. } => kind,
            Self::Timeout { .. } => "TimeoutError",
            Self::Queue(_) => "QueueError",
            Self::Internal(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kms_errors_are_retryable() {
        let transient = SignoffError::Kms {
            message: "connection reset".into(),
            transient: true,
            source: None,
        };
        let denied = SignoffError::Kms {
            message: "AccessDeniedException".into(),
            transient: false,
            source: None,
        };
        assert!(transient.is_retryable());
        assert!(!denied.is_retryable());
    }

    #[test]
    fn corruption_and_credential_errors_are_not_retryable() {
        assert!(!SignoffError::AuthenticationFailure("tag mismatch".into()).is_retryable());
        let missing = SignoffError::CredentialNotFound {
            user_id: 7,
            site: "timecard_portal".into(),
        };
        assert!(!missing.is_retryable());
        assert!(missing.is_credential_error());
    }

    #[test]
    fn automation_kind_is_reported_as_type_name() {
        let err = SignoffError::Automation {
            message: "page crashed".into(),
            kind: "BrowserError".into(),
        };
        assert_eq!(err.kind_name(), "BrowserError");
        assert_eq!(err.to_string(), "page crashed");
    }
}
