// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable task queue with ack-after-completion semantics.
//!
//! A dequeued entry is locked until `locked_until`. If the worker dies or
//! exceeds its hard limit without acking, the lock expires and the entry is
//! delivered again. `attempts` counts deliveries; an entry whose deliveries
//! reach `max_attempts` is marked failed instead of being redelivered.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use signoff_core::SignoffError;

use crate::database::{Database, map_tr_err};
use crate::models::QueueEntry;

/// Per-status entry counts for one queue.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// `now + delay`, or a queue error when the instant is not representable.
fn deadline(now: DateTime<Utc>, delay: Duration) -> Result<DateTime<Utc>, SignoffError> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .ok_or_else(|| SignoffError::Queue(format!("delay of {delay:?} is out of range")))
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: u32,
) -> Result<i64, SignoffError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts, created_at, updated_at, available_at) \
                 VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
                params![queue_name, payload, max_attempts.max(1), now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Dequeue the next ready entry from the named queue and lock it for `lock_for`.
///
/// Ready means pending with `available_at` in the past, or processing with an
/// expired lock. Returns `None` if nothing is ready.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lock_for: Duration,
) -> Result<Option<QueueEntry>, SignoffError> {
    dequeue_at(db, queue_name, lock_for, Utc::now()).await
}

/// [`dequeue`] evaluated at an explicit instant.
pub async fn dequeue_at(
    db: &Database,
    queue_name: &str,
    lock_for: Duration,
    now: DateTime<Utc>,
) -> Result<Option<QueueEntry>, SignoffError> {
    let queue_name = queue_name.to_string();
    let locked_until = deadline(now, lock_for)?;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            // Expired locks with no deliveries left are abandoned, not redelivered.
            tx.execute(
                "UPDATE queue SET status = 'failed', locked_until = NULL, updated_at = ?2, \
                 last_error = COALESCE(last_error, 'lock expired') \
                 WHERE queue_name = ?1 AND status = 'processing' AND locked_until <= ?2 \
                 AND attempts >= max_attempts",
                params![queue_name, now],
            )?;

            let entry = tx
                .query_row(
                    &format!(
                        "SELECT {} FROM queue \
                         WHERE queue_name = ?1 AND ( \
                             (status = 'pending' AND available_at <= ?2) \
                             OR (status = 'processing' AND locked_until <= ?2)) \
                         ORDER BY available_at ASC, id ASC \
                         LIMIT 1",
                        QueueEntry::COLUMNS
                    ),
                    params![queue_name, now],
                    QueueEntry::from_row,
                )
                .optional()?;

            let Some(entry) = entry else {
                tx.commit()?;
                return Ok(None);
            };

            tx.execute(
                "UPDATE queue SET status = 'processing', attempts = attempts + 1, \
                 locked_until = ?1, updated_at = ?2 WHERE id = ?3",
                params![locked_until, now, entry.id],
            )?;
            tx.commit()?;

            Ok(Some(QueueEntry {
                status: "processing".to_string(),
                attempts: entry.attempts + 1,
                locked_until: Some(locked_until),
                updated_at: now,
                ..entry
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge successful processing of a queue entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), SignoffError> {
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL, updated_at = ?1 \
                 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Release an entry for another delivery after `delay`.
///
/// Returns `false` and marks the entry failed when its deliveries are used up.
pub async fn retry_later(
    db: &Database,
    id: i64,
    delay: Duration,
    error: &str,
) -> Result<bool, SignoffError> {
    let error = error.to_string();
    let now = Utc::now();
    let available_at = deadline(now, delay)?;
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            if attempts >= max_attempts {
                conn.execute(
                    "UPDATE queue SET status = 'failed', locked_until = NULL, last_error = ?1, \
                     updated_at = ?2 WHERE id = ?3",
                    params![error, now, id],
                )?;
                Ok(false)
            } else {
                conn.execute(
                    "UPDATE queue SET status = 'pending', locked_until = NULL, last_error = ?1, \
                     available_at = ?2, updated_at = ?3 WHERE id = ?4",
                    params![error, available_at, now, id],
                )?;
                Ok(true)
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a queue entry as permanently failed.
pub async fn fail(db: &Database, id: i64, error: &str) -> Result<(), SignoffError> {
    let error = error.to_string();
    let now = Utc::now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'failed', locked_until = NULL, last_error = ?1, \
                 updated_at = ?2 WHERE id = ?3",
                params![error, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one entry by id.
pub async fn get_entry(db: &Database, id: i64) -> Result<Option<QueueEntry>, SignoffError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM queue WHERE id = ?1", QueueEntry::COLUMNS),
                params![id],
                QueueEntry::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Count entries of the named queue by status.
pub async fn counts(db: &Database, queue_name: &str) -> Result<QueueCounts, SignoffError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM queue WHERE queue_name = ?1 GROUP BY status")?;
            let rows = stmt.query_map(params![queue_name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = QueueCounts::default();
            for row in rows {
                let (status, n) = row?;
                match status.as_str() {
                    "pending" => counts.pending = n,
                    "processing" => counts.processing = n,
                    "completed" => counts.completed = n,
                    "failed" => counts.failed = n,
                    _ => {}
                }
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}
