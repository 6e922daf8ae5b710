// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent run ledger: one `timecard_runs` row per automation attempt.
//!
//! A row is created with the provisional status before any secret is
//! decrypted, and receives exactly one terminal update. The terminal update
//! and the user's counters change in the same transaction, so the sum of a
//! user's counters always equals their number of completed runs.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Transaction, params};
use signoff_core::{RunStatus, SignoffError, SiteOutcome};
use signoff_storage::models::TimecardRun;
use signoff_storage::queries::runs;
use signoff_storage::{Database, map_tr_err};
use tracing::{info, warn};

use crate::classify;

/// Maximum stored length of `error_reason`, in characters.
pub const MAX_ERROR_REASON_CHARS: usize = 255;

/// Truncate an error reason to [`MAX_ERROR_REASON_CHARS`] on a char boundary.
pub fn truncate_reason(reason: &str) -> String {
    match reason.char_indices().nth(MAX_ERROR_REASON_CHARS) {
        Some((idx, _)) => reason[..idx].to_string(),
        None => reason.to_string(),
    }
}

/// An open run, as returned by [`RunLedger::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
    pub user_id: i64,
    pub credential_id: String,
    /// Version the run will record as consumed.
    pub dek_version: i64,
    pub started_at: DateTime<Utc>,
}

/// Terminal values written to a run row.
struct Terminal {
    status: RunStatus,
    error_reason: Option<String>,
    completed_at: DateTime<Utc>,
}

/// Writes and finalizes run rows.
#[derive(Clone)]
pub struct RunLedger {
    db: Database,
}

impl RunLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the run row with the provisional status and stamp the user's
    /// `last_timecard_check_at` with the start time, in one transaction.
    pub async fn begin(
        &self,
        user_id: i64,
        credential_id: &str,
        dek_version: i64,
        started_at: DateTime<Utc>,
    ) -> Result<RunHandle, SignoffError> {
        let handle = RunHandle {
            run_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            credential_id: credential_id.to_string(),
            dek_version,
            started_at,
        };
        let row = handle.clone();
        let provisional = RunStatus::PROVISIONAL.to_string();

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO timecard_runs (id, user_id, credential_id, credential_dek_version, \
                     started_at, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        row.run_id,
                        row.user_id,
                        row.credential_id,
                        row.dek_version,
                        row.started_at,
                        provisional,
                    ],
                )?;
                tx.execute(
                    "UPDATE users SET last_timecard_check_at = ?1, updated_at = ?1 WHERE id = ?2",
                    params![row.started_at, row.user_id],
                )?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;

        info!(
            run_id = %handle.run_id,
            user_id,
            dek_version,
            "created timecard run"
        );
        Ok(handle)
    }

    /// Record that the run consumed a different credential version than the
    /// one captured at [`begin`](Self::begin).
    pub async fn record_dek_version(
        &self,
        handle: &mut RunHandle,
        dek_version: i64,
    ) -> Result<(), SignoffError> {
        if handle.dek_version == dek_version {
            return Ok(());
        }
        warn!(
            run_id = %handle.run_id,
            user_id = handle.user_id,
            recorded = handle.dek_version,
            current = dek_version,
            "credential version changed during run, using current credentials"
        );
        let run_id = handle.run_id.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE timecard_runs SET credential_dek_version = ?1 \
                     WHERE id = ?2 AND completed_at IS NULL",
                    params![dek_version, run_id],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        handle.dek_version = dek_version;
        Ok(())
    }

    /// Finalize the run from the automation collaborator's result.
    ///
    /// Updates the run row, the user's counters and status, and on success
    /// the user's `last_timecard_signoff_at` and the credential's
    /// `last_success_at`. Fails if the run was already finalized.
    pub async fn complete(
        &self,
        handle: &RunHandle,
        outcome: &SiteOutcome,
    ) -> Result<RunStatus, SignoffError> {
        let status = classify::classify_outcome(outcome);
        let terminal = Terminal {
            status,
            error_reason: outcome.error.as_deref().map(truncate_reason),
            completed_at: Utc::now(),
        };
        if !self.finalize(handle, terminal).await? {
            return Err(SignoffError::Internal(format!(
                "timecard run {} was already finalized",
                handle.run_id
            )));
        }
        info!(
            run_id = %handle.run_id,
            user_id = handle.user_id,
            status = %status,
            message = %outcome.message,
            "timecard run completed"
        );
        Ok(status)
    }

    /// Finalize the run with an explicit failure status and reason.
    ///
    /// Runs in a fresh transaction that re-reads the row. Returns `false`
    /// without writing when the row is already terminal.
    pub async fn fail(
        &self,
        handle: &RunHandle,
        status: RunStatus,
        reason: &str,
    ) -> Result<bool, SignoffError> {
        let terminal = Terminal {
            status,
            error_reason: Some(truncate_reason(reason)),
            completed_at: Utc::now(),
        };
        let written = self.finalize(handle, terminal).await?;
        if written {
            warn!(
                run_id = %handle.run_id,
                user_id = handle.user_id,
                status = %status,
                reason,
                "timecard run failed"
            );
        }
        Ok(written)
    }

    /// Finalize the run from an error raised mid-run, classifying it by its
    /// type name and message. The reason is recorded as `Exception: <msg>`.
    pub async fn fail_with_error(
        &self,
        handle: &RunHandle,
        err: &SignoffError,
    ) -> Result<RunStatus, SignoffError> {
        let status = classify::classify_error(err);
        self.fail(handle, status, &format!("Exception: {err}")).await?;
        Ok(status)
    }

    /// Fetch a run row.
    pub async fn get(&self, run_id: &str) -> Result<Option<TimecardRun>, SignoffError> {
        runs::get_run(&self.db, run_id).await
    }

    async fn finalize(&self, handle: &RunHandle, terminal: Terminal) -> Result<bool, SignoffError> {
        let handle = handle.clone();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let open: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM timecard_runs WHERE id = ?1 AND completed_at IS NULL",
                        params![handle.run_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if open.is_none() {
                    return Ok(false);
                }
                write_terminal(&tx, &handle, &terminal)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn write_terminal(
    tx: &Transaction<'_>,
    handle: &RunHandle,
    terminal: &Terminal,
) -> rusqlite::Result<()> {
    let status = terminal.status;
    let already = status == RunStatus::LoginSuccessAlreadySigned;
    let signed = status == RunStatus::LoginSuccessSignedOff;

    tx.execute(
        "UPDATE timecard_runs SET completed_at = ?1, status = ?2, error_reason = ?3, \
         login_success = ?4, signed_off_performed = ?5, already_signed_off_detected = ?6 \
         WHERE id = ?7",
        params![
            terminal.completed_at,
            status.to_string(),
            terminal.error_reason,
            status.is_success(),
            signed,
            already,
            handle.run_id,
        ],
    )?;

    let counter = if signed {
        "auto_signed_off_count"
    } else if already {
        "already_signed_off_count"
    } else {
        "failed_login_count"
    };
    tx.execute(
        &format!(
            "UPDATE users SET {counter} = {counter} + 1, last_timecard_check_status = ?1, \
             last_timecard_check_at = COALESCE(last_timecard_check_at, ?2), updated_at = ?3 \
             WHERE id = ?4"
        ),
        params![
            status.to_string(),
            handle.started_at,
            terminal.completed_at,
            handle.user_id,
        ],
    )?;

    if status.is_success() {
        tx.execute(
            "UPDATE users SET last_timecard_signoff_at = ?1 WHERE id = ?2",
            params![terminal.completed_at, handle.user_id],
        )?;
        tx.execute(
            "UPDATE credentials SET last_success_at = ?1 WHERE id = ?2",
            params![terminal.completed_at, handle.credential_id],
        )?;
    }
    Ok(())
}
