// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only views over the run ledger. Writes go through `signoff-ledger`.

use rusqlite::{OptionalExtension, params};
use signoff_core::SignoffError;

use crate::database::{Database, map_tr_err};
use crate::models::TimecardRun;

/// Fetch a run by id.
pub async fn get_run(db: &Database, run_id: &str) -> Result<Option<TimecardRun>, SignoffError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM timecard_runs WHERE id = ?1", TimecardRun::COLUMNS),
                params![run_id],
                TimecardRun::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent runs for a user, newest first.
pub async fn runs_for_user(
    db: &Database,
    user_id: i64,
    limit: u32,
) -> Result<Vec<TimecardRun>, SignoffError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM timecard_runs WHERE user_id = ?1 \
                 ORDER BY started_at DESC LIMIT ?2",
                TimecardRun::COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id, limit], TimecardRun::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Runs that never reached a terminal update, oldest first.
///
/// These are attempts whose worker was killed between creating the row and
/// finalizing it.
pub async fn incomplete_runs(db: &Database) -> Result<Vec<TimecardRun>, SignoffError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM timecard_runs WHERE completed_at IS NULL ORDER BY started_at",
                TimecardRun::COLUMNS
            ))?;
            let rows = stmt.query_map([], TimecardRun::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCredential;
    use crate::queries::{credentials, users};
    use chrono::Utc;

    async fn insert_run(db: &Database, user_id: i64, credential_id: &str, complete: bool) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let run_id = id.clone();
        let credential_id = credential_id.to_string();
        let now = Utc::now();
        let completed_at = complete.then_some(now);
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO timecard_runs (id, user_id, credential_id, credential_dek_version, \
                     started_at, completed_at, status) \
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, 'login_failed_unknown_error')",
                    params![run_id, user_id, credential_id, now, completed_at],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn incomplete_runs_lists_only_unfinished() {
        let db = Database::open_in_memory().await.unwrap();
        let user = users::create_user(&db, "r@example.com", None, None)
            .await
            .unwrap();
        let stored = credentials::upsert_credential(
            &db,
            NewCredential {
                user_id: user.id,
                site: "timecard_portal".into(),
                enc_username: vec![1],
                nonce_username: vec![0; 12],
                enc_password: vec![2],
                nonce_password: vec![0; 12],
                dek_wrapped: vec![3],
                kms_key_id: "k".into(),
            },
        )
        .await
        .unwrap();

        let done = insert_run(&db, user.id, &stored.credential_id, true).await;
        let open = insert_run(&db, user.id, &stored.credential_id, false).await;

        let incomplete = incomplete_runs(&db).await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].id, open);
        assert!(!incomplete[0].is_complete());

        let run = get_run(&db, &done).await.unwrap().unwrap();
        assert!(run.is_complete());
        assert_eq!(runs_for_user(&db, user.id, 10).await.unwrap().len(), 2);
    }
}
