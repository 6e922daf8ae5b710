// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps automation outcomes and task errors onto the five run statuses.
//!
//! Classification is a pure function over the outcome. The keyword tables
//! below are plain data; the first matching rule wins and matching is
//! case-insensitive.

use signoff_core::{RunStatus, SignoffError, SiteOutcome};

/// Message prefixes the automation collaborator uses to tag its failures.
pub const PREFIX_RULES: &[(&[&str], RunStatus)] = &[
    (
        &["login error:", "credential error:"],
        RunStatus::LoginFailedBadCredentials,
    ),
    (
        &["site error:", "site timeout:"],
        RunStatus::LoginFailedSiteError,
    ),
    (&["automation error:"], RunStatus::LoginFailedUnknownError),
];

/// Error type names that point at the portal or browser rather than the user.
pub const ERROR_TYPE_SITE_KEYWORDS: &[&str] = &["timeout", "playwright", "browser"];

/// Untagged message keywords, checked in order.
pub const MESSAGE_RULES: &[(&[&str], RunStatus)] = &[
    (
        &[
            "credential",
            "password",
            "login",
            "authentication",
            "unauthorized",
            "invalid",
            "user does not exist",
            "401",
            "403",
        ],
        RunStatus::LoginFailedBadCredentials,
    ),
    (
        &[
            "timeout",
            "network",
            "connection",
            "site",
            "server",
            "502",
            "503",
            "504",
            "500",
            "playwright",
            "browser",
        ],
        RunStatus::LoginFailedSiteError,
    ),
];

/// Classify a failure message, optionally with the name of the error type
/// that produced it.
pub fn classify_failure(message: &str, error_type: Option<&str>) -> RunStatus {
    let message = message.to_lowercase();

    for (prefixes, status) in PREFIX_RULES {
        if prefixes.iter().any(|p| message.starts_with(p)) {
            return *status;
        }
    }

    if let Some(error_type) = error_type {
        let error_type = error_type.to_lowercase();
        if ERROR_TYPE_SITE_KEYWORDS
            .iter()
            .any(|k| error_type.contains(k))
        {
            return RunStatus::LoginFailedSiteError;
        }
    }

    for (keywords, status) in MESSAGE_RULES {
        if keywords.iter().any(|k| message.contains(k)) {
            return *status;
        }
    }

    RunStatus::LoginFailedUnknownError
}

/// Classify a result returned by the automation collaborator.
pub fn classify_outcome(outcome: &SiteOutcome) -> RunStatus {
    if outcome.success {
        if outcome.message.to_lowercase().contains("already") {
            RunStatus::LoginSuccessAlreadySigned
        } else {
            RunStatus::LoginSuccessSignedOff
        }
    } else {
        classify_failure(outcome.error.as_deref().unwrap_or_default(), None)
    }
}

/// Classify an error raised during a run.
///
/// Known credential errors are bad credentials regardless of their text.
pub fn classify_error(err: &SignoffError) -> RunStatus {
    if err.is_credential_error() {
        return RunStatus::LoginFailedBadCredentials;
    }
    classify_failure(&err.to_string(), Some(err.kind_name()))
}
