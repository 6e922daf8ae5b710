// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the users, credentials, timecard_runs, and queue tables.
//!
//! Each type exposes a `COLUMNS` list and a `from_row` mapper so every query
//! module (and the run ledger) selects rows the same way.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use signoff_core::RunStatus;

/// A registered user and their run counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// Stable public identifier (UUID string), used as the portal employee id.
    pub public_id: String,
    /// Always stored lowercased.
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub needs_password: bool,
    pub last_timecard_check_at: Option<DateTime<Utc>>,
    pub last_timecard_signoff_at: Option<DateTime<Utc>>,
    pub last_timecard_check_status: Option<RunStatus>,
    pub auto_signed_off_count: i64,
    pub already_signed_off_count: i64,
    pub failed_login_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "id, public_id, email, first_name, last_name, \
        needs_password, last_timecard_check_at, last_timecard_signoff_at, \
        last_timecard_check_status, auto_signed_off_count, already_signed_off_count, \
        failed_login_count, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: Option<String> = row.get(8)?;
        Ok(Self {
            id: row.get(0)?,
            public_id: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            needs_password: row.get(5)?,
            last_timecard_check_at: row.get(6)?,
            last_timecard_signoff_at: row.get(7)?,
            last_timecard_check_status: status.map(|s| parse_status(8, &s)).transpose()?,
            auto_signed_off_count: row.get(9)?,
            already_signed_off_count: row.get(10)?,
            failed_login_count: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    /// "First Last", or `None` when neither name is set.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// An encrypted portal login for one (user, site) pair.
///
/// Contains only ciphertext, nonces, and the wrapped data key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub user_id: i64,
    pub site: String,
    pub enc_username: Vec<u8>,
    pub nonce_username: Vec<u8>,
    pub enc_password: Vec<u8>,
    pub nonce_password: Vec<u8>,
    pub dek_wrapped: Vec<u8>,
    pub kms_key_id: String,
    pub dek_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub const COLUMNS: &'static str = "id, user_id, site, enc_username, nonce_username, \
        enc_password, nonce_password, dek_wrapped, kms_key_id, dek_version, \
        created_at, updated_at, last_success_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            site: row.get(2)?,
            enc_username: row.get(3)?,
            nonce_username: row.get(4)?,
            enc_password: row.get(5)?,
            nonce_password: row.get(6)?,
            dek_wrapped: row.get(7)?,
            kms_key_id: row.get(8)?,
            dek_version: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            last_success_at: row.get(12)?,
        })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("site", &self.site)
            .field("kms_key_id", &self.kms_key_id)
            .field("dek_version", &self.dek_version)
            .finish_non_exhaustive()
    }
}

/// Values for inserting or replacing a credential row.
pub struct NewCredential {
    pub user_id: i64,
    pub site: String,
    pub enc_username: Vec<u8>,
    pub nonce_username: Vec<u8>,
    pub enc_password: Vec<u8>,
    pub nonce_password: Vec<u8>,
    pub dek_wrapped: Vec<u8>,
    pub kms_key_id: String,
}

/// One automation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimecardRun {
    pub id: String,
    pub user_id: i64,
    pub credential_id: String,
    pub credential_dek_version: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub error_reason: Option<String>,
    pub login_success: bool,
    pub signed_off_performed: bool,
    pub already_signed_off_detected: bool,
}

impl TimecardRun {
    pub const COLUMNS: &'static str = "id, user_id, credential_id, credential_dek_version, \
        started_at, completed_at, status, error_reason, login_success, \
        signed_off_performed, already_signed_off_detected";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            credential_id: row.get(2)?,
            credential_dek_version: row.get(3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            status: parse_status(6, &status)?,
            error_reason: row.get(7)?,
            login_success: row.get(8)?,
            signed_off_performed: row.get(9)?,
            already_signed_off_detected: row.get(10)?,
        })
    }

    /// Whether the run has been finalized.
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A task queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    /// Number of times the entry has been delivered to a worker.
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub const COLUMNS: &'static str = "id, queue_name, payload, status, attempts, max_attempts, \
        last_error, created_at, updated_at, available_at, locked_until";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            queue_name: row.get(1)?,
            payload: row.get(2)?,
            status: row.get(3)?,
            attempts: row.get(4)?,
            max_attempts: row.get(5)?,
            last_error: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            available_at: row.get(9)?,
            locked_until: row.get(10)?,
        })
    }
}

fn parse_status(idx: usize, s: &str) -> rusqlite::Result<RunStatus> {
    RunStatus::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
