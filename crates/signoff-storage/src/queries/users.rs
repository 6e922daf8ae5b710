// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User lookups, enrollment, and scheduler eligibility.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use signoff_core::{RunStatus, SignoffError};

use crate::database::{Database, map_tr_err};
use crate::models::User;

/// Users partitioned for a bulk enqueue.
#[derive(Debug, Default)]
pub struct EligibleUsers {
    /// `needs_password = false` and at least one credential.
    pub eligible: Vec<User>,
    /// `needs_password = false` but no credential row.
    pub without_credentials: Vec<User>,
}

/// Create a user. The email is stored lowercased.
pub async fn create_user(
    db: &Database,
    email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<User, SignoffError> {
    let email = email.trim().to_lowercase();
    let first_name = first_name.map(str::to_string);
    let last_name = last_name.map(str::to_string);
    let public_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (public_id, email, first_name, last_name, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![public_id, email, first_name, last_name, now],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
                params![id],
                User::from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a user by database id.
pub async fn get_user(db: &Database, id: i64) -> Result<Option<User>, SignoffError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
                params![id],
                User::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a user by email, case-insensitively.
pub async fn get_user_by_email(db: &Database, email: &str) -> Result<Option<User>, SignoffError> {
    let email = email.trim().to_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS),
                params![email],
                User::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Return the user with this email, creating them on first submission.
///
/// Names are filled in only when the existing row has none.
pub async fn get_or_create_user(
    db: &Database,
    email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<User, SignoffError> {
    if let Some(user) = get_user_by_email(db, email).await? {
        if user.first_name.is_none() && user.last_name.is_none() {
            let id = user.id;
            let first_name = first_name.map(str::to_string);
            let last_name = last_name.map(str::to_string);
            let now = Utc::now();
            db.connection()
                .call(move |conn| {
                    conn.execute(
                        "UPDATE users SET first_name = ?1, last_name = ?2, updated_at = ?3 \
                         WHERE id = ?4",
                        params![first_name, last_name, now, id],
                    )?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            return get_user(db, id)
                .await?
                .ok_or_else(|| SignoffError::UserNotFound(id.to_string()));
        }
        return Ok(user);
    }
    create_user(db, email, first_name, last_name).await
}

/// All users ordered by id.
pub async fn list_users(db: &Database) -> Result<Vec<User>, SignoffError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users ORDER BY id", User::COLUMNS))?;
            let rows = stmt.query_map([], User::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Users that do not need a new password, split by whether they have a
/// credential row for any site.
pub async fn eligible_users(db: &Database) -> Result<EligibleUsers, SignoffError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, EXISTS (SELECT 1 FROM credentials c WHERE c.user_id = users.id) \
                 FROM users WHERE needs_password = 0 ORDER BY id",
                User::COLUMNS
            ))?;
            let rows = stmt.query_map([], |row| Ok((User::from_row(row)?, row.get::<_, bool>(14)?)))?;
            let mut result = EligibleUsers::default();
            for row in rows {
                let (user, has_credentials) = row?;
                if has_credentials {
                    result.eligible.push(user);
                } else {
                    result.without_credentials.push(user);
                }
            }
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Set or clear the `needs_password` flag.
pub async fn set_needs_password(
    db: &Database,
    user_id: i64,
    needs_password: bool,
) -> Result<(), SignoffError> {
    let now = Utc::now();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET needs_password = ?1, updated_at = ?2 WHERE id = ?3",
                params![needs_password, now, user_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(SignoffError::UserNotFound(user_id.to_string()));
    }
    Ok(())
}

/// Record a check that found no stored credential. No run row is created.
pub async fn record_missing_credentials(
    db: &Database,
    user_id: i64,
    checked_at: DateTime<Utc>,
) -> Result<(), SignoffError> {
    let status = RunStatus::LoginFailedBadCredentials.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET last_timecard_check_at = ?1, last_timecard_check_status = ?2, \
                 updated_at = ?1 WHERE id = ?3",
                params![checked_at, status, user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
