// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the sign-off crates.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use zeroize::Zeroizing;

/// Site name used for the single supported timecard portal.
pub const DEFAULT_SITE: &str = "timecard_portal";

/// Queue name the scheduler and CLI submit sign-off tasks to.
pub const SIGNOFF_QUEUE: &str = "signoff";

/// Terminal status of a timecard run.
///
/// Persisted as the snake_case variant name. Every run row is created with
/// [`RunStatus::PROVISIONAL`] so a crash mid-run still leaves an auditable row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Logged in and performed the sign-off.
    LoginSuccessSignedOff,
    /// Logged in and found the timecard already signed off.
    LoginSuccessAlreadySigned,
    /// The portal rejected the stored credentials, or none could be used.
    LoginFailedBadCredentials,
    /// The portal was unreachable, slow, or returned a server error.
    LoginFailedSiteError,
    /// Anything that could not be attributed.
    LoginFailedUnknownError,
}

impl RunStatus {
    /// Status written when a run row is first created.
    pub const PROVISIONAL: Self = Self::LoginFailedUnknownError;

    /// Whether the run logged in successfully.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::LoginSuccessSignedOff | Self::LoginSuccessAlreadySigned
        )
    }
}

/// Payload of one queued sign-off task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignoffTask {
    /// Database id of the user to sign off for.
    pub user_id: i64,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Kms,
    Automation,
    Notifier,
}

/// A freshly minted data encryption key.
///
/// `plaintext` is usable immediately and zeroed on drop; `wrapped` is the
/// KMS-encrypted form that is safe to persist.
pub struct GeneratedDataKey {
    pub plaintext: Zeroizing<[u8; 32]>,
    pub wrapped: Vec<u8>,
    pub key_id: String,
}

impl std::fmt::Debug for GeneratedDataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedDataKey")
            .field("plaintext", &"[REDACTED]")
            .field("wrapped_len", &self.wrapped.len())
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Plaintext portal login handed to the automation collaborator.
///
/// Secrets are zeroed when the value is dropped.
#[derive(Debug)]
pub struct PortalLogin {
    pub username: SecretString,
    pub password: SecretString,
    pub domain: String,
    pub email: String,
    pub display_name: Option<String>,
    pub employee_id: String,
}

/// Result returned by the automation collaborator.
///
/// Only `success`, `message`, and `error` are inspected for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

impl SiteOutcome {
    /// A successful outcome with the given message.
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            screenshot_path: None,
        }
    }

    /// A failed outcome carrying the collaborator's error text.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            error: Some(error),
            screenshot_path: None,
        }
    }
}
