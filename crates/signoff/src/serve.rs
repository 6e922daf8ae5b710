// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `signoff serve` command implementation.
//!
//! Opens the database, builds the decrypt-only KMS client and the automation
//! collaborator, then runs the queue worker pool and the fortnightly enqueue
//! scheduler until SIGTERM or SIGINT.

use std::sync::Arc;
use std::time::Duration;

use signoff_config::model::SignoffConfig;
use signoff_core::SignoffError;
use signoff_cron::EnqueueScheduler;
use signoff_ledger::RunLedger;
use signoff_storage::Database;
use signoff_storage::queries::runs;
use signoff_vault::{CredentialReader, decrypt_client};
use signoff_worker::{
    LogNotifier, ProcessAutomation, RetryPolicy, SignoffContext, WorkerPool,
    install_signal_handler,
};
use tracing::{error, info, warn};

/// Open the configured database, running migrations.
pub(crate) async fn open_database(config: &SignoffConfig) -> Result<Database, SignoffError> {
    Database::open_with(&config.storage.database_path, config.storage.wal_mode).await
}

/// Assemble the run context. Only the decrypt-role KMS client is built.
pub(crate) async fn build_context(
    config: &SignoffConfig,
    db: Database,
) -> Result<SignoffContext, SignoffError> {
    let decryptor = decrypt_client(&config.kms).await?;
    Ok(SignoffContext {
        reader: CredentialReader::new(db.clone(), decryptor),
        ledger: RunLedger::new(db.clone()),
        automation: Arc::new(ProcessAutomation::new(&config.portal)),
        notifier: Arc::new(LogNotifier),
        site: config.portal.site.clone(),
        domain: config.portal.default_domain.clone(),
        soft_time_limit: Duration::from_secs(config.worker.soft_time_limit_secs),
        db,
    })
}

/// Runs the `signoff serve` command.
pub async fn run_serve(config: SignoffConfig) -> Result<(), SignoffError> {
    info!(
        database = %config.storage.database_path,
        concurrency = config.worker.concurrency,
        "starting signoff serve"
    );

    let db = open_database(&config).await?;
    report_interrupted_runs(&db).await?;

    let ctx = Arc::new(build_context(&config, db.clone()).await?);
    let pool = Arc::new(WorkerPool::new(Arc::clone(&ctx), &config.worker));
    let cancel = install_signal_handler();

    let worker_handle = tokio::spawn(Arc::clone(&pool).run(cancel.clone()));

    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = EnqueueScheduler::new(
            db.clone(),
            Arc::clone(&ctx.notifier),
            config.scheduler.clone(),
            RetryPolicy::from_config(&config.worker).max_attempts(),
        )?;
        Some(tokio::spawn(scheduler.run(cancel.clone())))
    } else {
        info!("scheduler disabled, only processing queued tasks");
        None
    };

    if let Err(e) = worker_handle.await {
        error!(error = %e, "worker pool task failed");
    }
    // The worker pool only returns after cancellation or a panic.
    cancel.cancel();
    if let Some(handle) = scheduler_handle
        && let Err(e) = handle.await
    {
        error!(error = %e, "scheduler task failed");
    }

    drop(pool);
    drop(ctx);
    db.close().await?;
    info!("signoff serve stopped");
    Ok(())
}

/// Log runs left without `completed_at` by a previous process.
///
/// The queue entries behind them are redelivered once their lock expires,
/// so the rows are reported but left as they are.
async fn report_interrupted_runs(db: &Database) -> Result<(), SignoffError> {
    let interrupted = runs::incomplete_runs(db).await?;
    if interrupted.is_empty() {
        return Ok(());
    }
    warn!(count = interrupted.len(), "found runs interrupted before completion");
    for run in &interrupted {
        warn!(
            run_id = %run.id,
            user_id = run.user_id,
            started_at = %run.started_at,
            "interrupted run"
        );
    }
    Ok(())
}
