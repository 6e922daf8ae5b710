// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue worker pool.
//!
//! Each worker loop pulls one entry at a time (prefetch of one) and acks it
//! only after the task finishes. A task that outlives the hard time limit is
//! abandoned without an ack; its entry is redelivered once the lock expires.

use std::sync::Arc;
use std::time::Duration;

use signoff_config::model::WorkerConfig;
use signoff_core::{SIGNOFF_QUEUE, SignoffError, SignoffTask};
use signoff_storage::models::QueueEntry;
use signoff_storage::queries::queue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::retry::RetryPolicy;
use crate::task::{SignoffContext, TaskOutcome};

/// Extra lock time beyond the hard limit before an entry is redelivered.
pub const LOCK_GRACE: Duration = Duration::from_secs(30);

/// What happened to one dequeued entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDisposition {
    /// The task finished and the entry was acked.
    Acked(TaskOutcome),
    /// A transient failure; the entry will be delivered again after `delay`.
    Retrying { delay: Duration },
    /// The entry was marked failed.
    Failed,
    /// The hard limit elapsed; the entry stays locked until it expires.
    Abandoned,
}

/// Pulls sign-off tasks off the queue and runs them.
pub struct WorkerPool {
    ctx: Arc<SignoffContext>,
    retry: RetryPolicy,
    concurrency: usize,
    hard_time_limit: Duration,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(ctx: Arc<SignoffContext>, config: &WorkerConfig) -> Self {
        Self {
            ctx,
            retry: RetryPolicy::from_config(config),
            concurrency: config.concurrency.max(1),
            hard_time_limit: Duration::from_secs(config.hard_time_limit_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// How long a dequeued entry stays invisible to other workers.
    pub fn lock_duration(&self) -> Duration {
        self.hard_time_limit + LOCK_GRACE
    }

    /// Run `concurrency` worker loops until `cancel` fires, then wait for
    /// in-flight tasks to finish.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(concurrency = self.concurrency, "worker pool started");
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let pool = Arc::clone(&self);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, cancel).await;
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker loop panicked");
            }
        }
        info!("worker pool stopped");
    }

    async fn worker_loop(&self, worker_id: usize, cancel: CancellationToken) {
        debug!(worker_id, "worker loop started");
        while !cancel.is_cancelled() {
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(worker_id, error = %e, "failed to poll queue"),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        debug!(worker_id, "worker loop stopped");
    }

    /// Dequeue and process at most one entry.
    pub async fn process_next(&self) -> Result<Option<EntryDisposition>, SignoffError> {
        let Some(entry) = queue::dequeue(&self.ctx.db, SIGNOFF_QUEUE, self.lock_duration()).await?
        else {
            return Ok(None);
        };
        self.process_entry(entry).await.map(Some)
    }

    async fn process_entry(&self, entry: QueueEntry) -> Result<EntryDisposition, SignoffError> {
        let task: SignoffTask = match serde_json::from_str(&entry.payload) {
            Ok(task) => task,
            Err(e) => {
                error!(entry_id = entry.id, error = %e, "malformed task payload");
                queue::fail(&self.ctx.db, entry.id, &format!("malformed payload: {e}")).await?;
                return Ok(EntryDisposition::Failed);
            }
        };
        let attempt = u32::try_from(entry.attempts).unwrap_or(u32::MAX);
        info!(entry_id = entry.id, user_id = task.user_id, attempt, "processing signoff task");

        let result =
            tokio::time::timeout(self.hard_time_limit, self.ctx.run_signoff(task.user_id)).await;

        match result {
            Ok(Ok(outcome)) => {
                queue::ack(&self.ctx.db, entry.id).await?;
                Ok(EntryDisposition::Acked(outcome))
            }
            Ok(Err(err)) if self.retry.should_retry(&err, attempt) => {
                let delay = self.retry.delay(attempt);
                warn!(
                    entry_id = entry.id,
                    user_id = task.user_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying task"
                );
                if queue::retry_later(&self.ctx.db, entry.id, delay, &err.to_string()).await? {
                    Ok(EntryDisposition::Retrying { delay })
                } else {
                    Ok(EntryDisposition::Failed)
                }
            }
            Ok(Err(err)) => {
                error!(
                    entry_id = entry.id,
                    user_id = task.user_id,
                    error = %err,
                    "signoff task failed"
                );
                queue::fail(&self.ctx.db, entry.id, &err.to_string()).await?;
                Ok(EntryDisposition::Failed)
            }
            Err(_) => {
                error!(
                    entry_id = entry.id,
                    user_id = task.user_id,
                    limit_secs = self.hard_time_limit.as_secs(),
                    "signoff task exceeded hard time limit, abandoning"
                );
                Ok(EntryDisposition::Abandoned)
            }
        }
    }
}
