// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eligible-user fan-out: one queued task per user.

use chrono::NaiveDate;
use serde_json::json;
use signoff_core::{AdminNotifier, SIGNOFF_QUEUE, SignoffError, SignoffTask};
use signoff_storage::Database;
use signoff_storage::queries::{queue, users};
use tracing::{error, info, warn};

/// What a fan-out did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    /// User ids a task was queued for.
    pub enqueued: Vec<i64>,
    /// `(user_id, email)` of users skipped for lacking credentials.
    pub without_credentials: Vec<(i64, String)>,
}

/// Queue one sign-off task per eligible user, regardless of the date.
///
/// Eligible users have `needs_password = false` and a stored credential.
/// Users without credentials are reported in one admin alert; a failed
/// alert is logged and does not fail the fan-out.
pub async fn enqueue_eligible(
    db: &Database,
    notifier: &dyn AdminNotifier,
    max_attempts: u32,
) -> Result<EnqueueReport, SignoffError> {
    let partition = users::eligible_users(db).await?;
    let mut report = EnqueueReport::default();

    for user in &partition.without_credentials {
        warn!(user_id = user.id, email = %user.email, "user has no credentials stored");
        report
            .without_credentials
            .push((user.id, user.email.clone()));
    }

    if !report.without_credentials.is_empty() {
        let listed: Vec<String> = report
            .without_credentials
            .iter()
            .map(|(id, email)| format!("{email} (ID: {id})"))
            .collect();
        let body = format!(
            "Found {} user(s) without credentials during signoff enqueue. \
             These users were skipped and will not receive automated signoffs.",
            listed.len()
        );
        let details = json!({
            "users_without_credentials": listed,
            "eligible_enqueued": partition.eligible.len(),
        });
        if let Err(e) = notifier
            .send_admin_alert("Users Missing Credentials During Enqueue", &body, &details)
            .await
        {
            error!(error = %e, "failed to send admin alert for users without credentials");
        }
    }

    info!(count = partition.eligible.len(), "enqueuing signoff tasks for eligible users");
    for user in &partition.eligible {
        let payload = serde_json::to_string(&SignoffTask { user_id: user.id })
            .map_err(|e| SignoffError::Queue(format!("failed to encode task payload: {e}")))?;
        queue::enqueue(db, SIGNOFF_QUEUE, &payload, max_attempts).await?;
        report.enqueued.push(user.id);
    }

    Ok(report)
}

/// Run the fan-out only when `today` is a sign-off Sunday.
///
/// Returns `None` on any other day.
pub async fn enqueue_if_signoff_day(
    db: &Database,
    notifier: &dyn AdminNotifier,
    today: NaiveDate,
    anchor: NaiveDate,
    max_attempts: u32,
) -> Result<Option<EnqueueReport>, SignoffError> {
    if !crate::schedule::is_fortnightly_sunday(today, anchor) {
        info!(%today, "not a signoff Sunday, skipping enqueue");
        return Ok(None);
    }
    enqueue_eligible(db, notifier, max_attempts).await.map(Some)
}
