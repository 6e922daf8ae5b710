// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential rows, one per (user, site).
//!
//! Re-submission replaces the row in place and bumps `dek_version`; history
//! is never kept.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use signoff_core::SignoffError;

use crate::database::{Database, map_tr_err};
use crate::models::{Credential, NewCredential};

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub credential_id: String,
    pub dek_version: i64,
}

/// Insert the credential with version 1, or replace the existing row and
/// increment its version, in one transaction.
///
/// A successful submission also clears the user's `needs_password` flag.
pub async fn upsert_credential(
    db: &Database,
    new: NewCredential,
) -> Result<StoredCredential, SignoffError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<(String, i64)> = tx
                .query_row(
                    "SELECT id, dek_version FROM credentials WHERE user_id = ?1 AND site = ?2",
                    params![new.user_id, new.site],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let stored = match existing {
                Some((id, version)) => {
                    tx.execute(
                        "UPDATE credentials SET enc_username = ?1, nonce_username = ?2, \
                         enc_password = ?3, nonce_password = ?4, dek_wrapped = ?5, \
                         kms_key_id = ?6, dek_version = dek_version + 1, updated_at = ?7 \
                         WHERE id = ?8",
                        params![
                            new.enc_username,
                            new.nonce_username,
                            new.enc_password,
                            new.nonce_password,
                            new.dek_wrapped,
                            new.kms_key_id,
                            now,
                            id,
                        ],
                    )?;
                    StoredCredential {
                        credential_id: id,
                        dek_version: version + 1,
                    }
                }
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO credentials (id, user_id, site, enc_username, nonce_username, \
                         enc_password, nonce_password, dek_wrapped, kms_key_id, dek_version, \
                         created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)",
                        params![
                            id,
                            new.user_id,
                            new.site,
                            new.enc_username,
                            new.nonce_username,
                            new.enc_password,
                            new.nonce_password,
                            new.dek_wrapped,
                            new.kms_key_id,
                            now,
                        ],
                    )?;
                    StoredCredential {
                        credential_id: id,
                        dek_version: 1,
                    }
                }
            };

            tx.execute(
                "UPDATE users SET needs_password = 0, updated_at = ?1 WHERE id = ?2",
                params![now, new.user_id],
            )?;
            tx.commit()?;
            Ok(stored)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the credential for (user, site).
pub async fn get_credential(
    db: &Database,
    user_id: i64,
    site: &str,
) -> Result<Option<Credential>, SignoffError> {
    let site = site.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM credentials WHERE user_id = ?1 AND site = ?2",
                    Credential::COLUMNS
                ),
                params![user_id, site],
                Credential::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Current `dek_version` for (user, site), without reading ciphertext.
pub async fn current_dek_version(
    db: &Database,
    user_id: i64,
    site: &str,
) -> Result<Option<(String, i64)>, SignoffError> {
    let site = site.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, dek_version FROM credentials WHERE user_id = ?1 AND site = ?2",
                params![user_id, site],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
