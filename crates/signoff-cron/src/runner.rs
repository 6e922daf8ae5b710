// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background loop that fires the fortnightly fan-out on the cron schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use signoff_config::model::SchedulerConfig;
use signoff_config::parse_cron;
use signoff_core::{AdminNotifier, SignoffError};
use signoff_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::enqueue::enqueue_if_signoff_day;
use crate::schedule::next_fire;

/// Drives [`enqueue_if_signoff_day`] from a cron expression.
pub struct EnqueueScheduler {
    db: Database,
    notifier: Arc<dyn AdminNotifier>,
    schedule: cron::Schedule,
    config: SchedulerConfig,
    max_attempts: u32,
}

impl EnqueueScheduler {
    /// Parse the configured cron expression. `max_attempts` is the delivery
    /// limit stamped on each queued task.
    pub fn new(
        db: Database,
        notifier: Arc<dyn AdminNotifier>,
        config: SchedulerConfig,
        max_attempts: u32,
    ) -> Result<Self, SignoffError> {
        let schedule = parse_cron(&config.cron).map_err(|e| {
            SignoffError::Config(format!("invalid scheduler.cron `{}`: {e}", config.cron))
        })?;
        Ok(Self {
            db,
            notifier,
            schedule,
            config,
            max_attempts,
        })
    }

    /// Run until `cancel` fires. Errors from a fan-out are logged and the
    /// loop waits for the next firing.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            cron = %self.config.cron,
            anchor = %self.config.anchor_date,
            use_utc = self.config.use_utc,
            "enqueue scheduler started"
        );

        loop {
            let Some((fire_at, fire_date)) =
                next_fire(&self.schedule, Utc::now(), self.config.use_utc)
            else {
                warn!("cron schedule has no future firings, scheduler stopping");
                break;
            };
            let wait = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!(%fire_at, wait_secs = wait.as_secs(), "waiting for next scheduler firing");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            match enqueue_if_signoff_day(
                &self.db,
                self.notifier.as_ref(),
                fire_date,
                self.config.anchor_date,
                self.max_attempts,
            )
            .await
            {
                Ok(Some(report)) => info!(
                    enqueued = report.enqueued.len(),
                    without_credentials = report.without_credentials.len(),
                    "signoff fan-out complete"
                ),
                Ok(None) => {}
                Err(e) => error!(error = %e, "signoff fan-out failed"),
            }
        }

        info!("enqueue scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signoff_test_utils::TestHarness;

    #[tokio::test]
    async fn invalid_cron_is_a_config_error() {
        let harness = TestHarness::new().await.unwrap();
        let config = SchedulerConfig {
            cron: "every other sunday".into(),
            ..SchedulerConfig::default()
        };
        let result = EnqueueScheduler::new(harness.db.clone(), harness.notifier.clone(), config, 4);
        assert!(matches!(result, Err(SignoffError::Config(_))));
    }

    #[tokio::test]
    async fn run_exits_on_cancel() {
        let harness = TestHarness::new().await.unwrap();
        let scheduler = EnqueueScheduler::new(
            harness.db.clone(),
            harness.notifier.clone(),
            SchedulerConfig::default(),
            4,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();
    }
}
