// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One user's sign-off run, from credential lookup to the terminal ledger write.
//!
//! Once a run row exists, every exit path leaves it terminal. Errors the
//! retry machinery needs are returned after the ledger write; everything
//! else is recorded and swallowed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use signoff_core::{
    AdminNotifier, PortalLogin, RunStatus, SignoffAutomation, SignoffError,
};
use signoff_ledger::{RunHandle, RunLedger};
use signoff_storage::Database;
use signoff_storage::models::{Credential, User};
use signoff_storage::queries::{credentials, users};
use signoff_vault::CredentialReader;
use tracing::{error, info, warn};

/// How a task ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The queued user no longer exists.
    UserMissing,
    /// The user must submit a new password first. No run is created.
    NeedsPassword,
    /// The user has no stored credential. No run is created.
    MissingCredentials,
    /// A run row was created and finalized.
    Completed { run_id: String, status: RunStatus },
}

/// Everything a run needs, constructed once at worker startup.
pub struct SignoffContext {
    pub db: Database,
    pub reader: CredentialReader,
    pub ledger: RunLedger,
    pub automation: Arc<dyn SignoffAutomation>,
    pub notifier: Arc<dyn AdminNotifier>,
    pub site: String,
    /// Login domain handed to the automation.
    pub domain: String,
    /// Deadline for the automation call.
    pub soft_time_limit: Duration,
}

impl SignoffContext {
    /// Run the sign-off for `user_id`.
    pub async fn run_signoff(&self, user_id: i64) -> Result<TaskOutcome, SignoffError> {
        let Some(user) = users::get_user(&self.db, user_id).await? else {
            warn!(user_id, "user not found, skipping signoff");
            return Ok(TaskOutcome::UserMissing);
        };

        if user.needs_password {
            info!(user_id, email = %user.email, "skipping user, needs password update");
            return Ok(TaskOutcome::NeedsPassword);
        }

        let Some(credential) = credentials::get_credential(&self.db, user.id, &self.site).await?
        else {
            self.handle_missing_credentials(&user).await?;
            return Ok(TaskOutcome::MissingCredentials);
        };

        self.execute_run(&user, &credential).await
    }

    /// Create the run for a credential snapshot and drive it to a terminal
    /// status.
    ///
    /// `credential` is the row as read before the run began; its
    /// `dek_version` is recorded on the run and corrected if the credential
    /// is replaced before it is decrypted.
    pub async fn execute_run(
        &self,
        user: &User,
        credential: &Credential,
    ) -> Result<TaskOutcome, SignoffError> {
        let mut handle = self
            .ledger
            .begin(user.id, &credential.id, credential.dek_version, Utc::now())
            .await?;
        let run_id = handle.run_id.clone();

        match self.attempt(user, &mut handle).await {
            Ok(status) => Ok(TaskOutcome::Completed { run_id, status }),
            Err(err) => {
                // No-op when the failing step already finalized the row.
                if let Err(write_err) = self.ledger.fail_with_error(&handle, &err).await {
                    error!(
                        run_id = %handle.run_id,
                        error = %write_err,
                        "failed to finalize timecard run after error"
                    );
                }
                Err(err)
            }
        }
    }

    async fn attempt(&self, user: &User, handle: &mut RunHandle) -> Result<RunStatus, SignoffError> {
        let decrypted = match self.reader.decrypt(user.id, &self.site).await {
            Ok(decrypted) => decrypted,
            Err(err) if err.is_credential_error() => {
                error!(user_id = user.id, error = %err, "failed to get credentials");
                let status = RunStatus::LoginFailedBadCredentials;
                self.ledger.fail(handle, status, &err.to_string()).await?;
                return Ok(status);
            }
            Err(err) => {
                error!(user_id = user.id, error = %err, "error decrypting credentials");
                self.ledger
                    .fail(
                        handle,
                        RunStatus::LoginFailedUnknownError,
                        &format!("Decryption error: {err}"),
                    )
                    .await?;
                return Err(err);
            }
        };

        self.ledger
            .record_dek_version(handle, decrypted.dek_version)
            .await?;

        let login = PortalLogin {
            username: decrypted.username,
            password: decrypted.password,
            domain: self.domain.clone(),
            email: user.email.clone(),
            display_name: user.display_name(),
            employee_id: user.public_id.clone(),
        };

        let result =
            tokio::time::timeout(self.soft_time_limit, self.automation.sign_off(&login)).await;
        drop(login);

        match result {
            Ok(Ok(outcome)) => self.ledger.complete(handle, &outcome).await,
            Ok(Err(err)) => {
                error!(user_id = user.id, error = %err, "automation raised during signoff");
                self.ledger.fail_with_error(handle, &err).await
            }
            Err(_) => {
                let err = SignoffError::Timeout {
                    duration: self.soft_time_limit,
                };
                warn!(user_id = user.id, "automation exceeded soft time limit");
                self.ledger.fail_with_error(handle, &err).await
            }
        }
    }

    async fn handle_missing_credentials(&self, user: &User) -> Result<(), SignoffError> {
        error!(user_id = user.id, email = %user.email, "no credentials found for user");
        users::record_missing_credentials(&self.db, user.id, Utc::now()).await?;

        let body = format!(
            "User {} (ID: {}) was queued for signoff but has no credentials stored. \
             The signoff task was skipped. Please ensure credentials are set up for this user.",
            user.email, user.id
        );
        let details = json!({
            "user_id": user.id,
            "email": user.email,
            "name": user.display_name(),
        });
        if let Err(e) = self
            .notifier
            .send_admin_alert("User Missing Credentials", &body, &details)
            .await
        {
            error!(error = %e, "failed to send admin alert for missing credentials");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signoff_core::{DEFAULT_SITE, SiteOutcome};
    use signoff_storage::queries::runs;
    use signoff_test_utils::{FlakyDecryptor, MockResponse, TestHarness};

    fn context(harness: &TestHarness) -> SignoffContext {
        SignoffContext {
            db: harness.db.clone(),
            reader: CredentialReader::new(harness.db.clone(), harness.kms.clone()),
            ledger: RunLedger::new(harness.db.clone()),
            automation: harness.automation.clone(),
            notifier: harness.notifier.clone(),
            site: DEFAULT_SITE.to_string(),
            domain: "MC Network".to_string(),
            soft_time_limit: Duration::from_secs(5),
        }
    }

    async fn only_run(harness: &TestHarness, user_id: i64) -> signoff_storage::models::TimecardRun {
        let mut all = runs::runs_for_user(&harness.db, user_id, 10).await.unwrap();
        assert_eq!(all.len(), 1);
        all.remove(0)
    }

    #[tokio::test]
    async fn successful_signoff_hands_plaintext_to_automation() {
        let harness = TestHarness::new().await.unwrap();
        let user = harness.enroll("ok@example.com", "okuser", "okpass").await.unwrap();
        let ctx = context(&harness);

        let outcome = ctx.run_signoff(user.id).await.unwrap();
        let TaskOutcome::Completed { status, .. } = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(status, RunStatus::LoginSuccessSignedOff);

        let logins = harness.automation.logins().await;
        assert_eq!(logins[0].username, "okuser");
        assert_eq!(logins[0].password, "okpass");
        assert_eq!(logins[0].domain, "MC Network");
        assert_eq!(logins[0].employee_id, user.public_id);
        assert_eq!(logins[0].display_name.as_deref(), Some("Test User"));

        let run = only_run(&harness, user.id).await;
        assert!(run.is_complete());
        assert!(run.signed_off_performed);
    }

    #[tokio::test]
    async fn missing_user_and_flagged_user_create_no_run() {
        let harness = TestHarness::new().await.unwrap();
        let ctx = context(&harness);
        assert_eq!(ctx.run_signoff(9999).await.unwrap(), TaskOutcome::UserMissing);

        let user = harness.enroll("flag@example.com", "u", "p").await.unwrap();
        users::set_needs_password(&harness.db, user.id, true).await.unwrap();
        assert_eq!(ctx.run_signoff(user.id).await.unwrap(), TaskOutcome::NeedsPassword);
        assert!(runs::runs_for_user(&harness.db, user.id, 10).await.unwrap().is_empty());
        assert_eq!(harness.automation.call_count().await, 0);
    }

    #[tokio::test]
    async fn missing_credentials_stamp_user_and_alert() {
        let harness = TestHarness::new().await.unwrap();
        let user = users::create_user(&harness.db, "nocreds@example.com", None, None)
            .await
            .unwrap();
        let ctx = context(&harness);

        assert_eq!(
            ctx.run_signoff(user.id).await.unwrap(),
            TaskOutcome::MissingCredentials
        );
        let user = users::get_user(&harness.db, user.id).await.unwrap().unwrap();
        assert!(user.last_timecard_check_at.is_some());
        assert_eq!(
            user.last_timecard_check_status,
            Some(RunStatus::LoginFailedBadCredentials)
        );
        assert!(runs::runs_for_user(&harness.db, user.id, 10).await.unwrap().is_empty());

        let alerts = harness.notifier.sent().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject, "User Missing Credentials");
        assert_eq!(alerts[0].details["user_id"], user.id);
    }

    #[tokio::test]
    async fn rotation_before_decrypt_corrects_recorded_version() {
        let harness = TestHarness::new().await.unwrap();
        let user = harness.enroll("race@example.com", "u", "old").await.unwrap();
        let snapshot = credentials::get_credential(&harness.db, user.id, DEFAULT_SITE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.dek_version, 1);

        // The user re-submits between the task's read and its decrypt.
        harness.rotate_password(user.id, "u", "new").await.unwrap();

        let ctx = context(&harness);
        ctx.execute_run(&user, &snapshot).await.unwrap();

        let run = only_run(&harness, user.id).await;
        assert_eq!(run.credential_dek_version, Some(2));
        assert_eq!(harness.automation.logins().await[0].password, "new");
    }

    #[tokio::test]
    async fn portal_rejection_is_recorded_not_raised() {
        let harness = TestHarness::builder()
            .with_responses(vec![MockResponse::Outcome(SiteOutcome::failed(
                "Login error: invalid password",
            ))])
            .build()
            .await
            .unwrap();
        let user = harness.enroll("bad@example.com", "u", "wrong").await.unwrap();
        let ctx = context(&harness);

        let outcome = ctx.run_signoff(user.id).await.unwrap();
        assert!(matches!(
            outcome,
            TaskOutcome::Completed {
                status: RunStatus::LoginFailedBadCredentials,
                ..
            }
        ));
        let run = only_run(&harness, user.id).await;
        assert_eq!(run.error_reason.as_deref(), Some("Login error: invalid password"));
        let user = users::get_user(&harness.db, user.id).await.unwrap().unwrap();
        assert_eq!(user.failed_login_count, 1);
    }

    #[tokio::test]
    async fn automation_error_is_classified_by_kind() {
        let harness = TestHarness::builder()
            .with_responses(vec![MockResponse::Error {
                message: "target page closed".into(),
                kind: "BrowserError".into(),
            }])
            .build()
            .await
            .unwrap();
        let user = harness.enroll("crash@example.com", "u", "p").await.unwrap();
        let ctx = context(&harness);

        let outcome = ctx.run_signoff(user.id).await.unwrap();
        assert!(matches!(
            outcome,
            TaskOutcome::Completed {
                status: RunStatus::LoginFailedSiteError,
                ..
            }
        ));
        let run = only_run(&harness, user.id).await;
        assert_eq!(
            run.error_reason.as_deref(),
            Some("Exception: target page closed")
        );
    }

    #[tokio::test]
    async fn soft_time_limit_records_site_error() {
        let harness = TestHarness::builder()
            .with_responses(vec![MockResponse::Delayed(
                Duration::from_secs(30),
                SiteOutcome::succeeded("too late"),
            )])
            .build()
            .await
            .unwrap();
        let user = harness.enroll("slow@example.com", "u", "p").await.unwrap();
        let ctx = SignoffContext {
            soft_time_limit: Duration::from_millis(50),
            ..context(&harness)
        };

        let outcome = ctx.run_signoff(user.id).await.unwrap();
        assert!(matches!(
            outcome,
            TaskOutcome::Completed {
                status: RunStatus::LoginFailedSiteError,
                ..
            }
        ));
        let run = only_run(&harness, user.id).await;
        assert!(run.is_complete());
    }

    #[tokio::test]
    async fn transient_kms_failure_finalizes_run_then_raises() {
        let harness = TestHarness::new().await.unwrap();
        let user = harness.enroll("kms@example.com", "u", "p").await.unwrap();
        let flaky = Arc::new(FlakyDecryptor::transient(harness.kms.clone(), 1));
        let ctx = SignoffContext {
            reader: CredentialReader::new(harness.db.clone(), flaky),
            ..context(&harness)
        };

        let err = ctx.run_signoff(user.id).await.unwrap_err();
        assert!(err.is_retryable());

        let run = only_run(&harness, user.id).await;
        assert!(run.is_complete());
        assert_eq!(run.status, RunStatus::LoginFailedUnknownError);
        assert!(run.error_reason.unwrap().starts_with("Decryption error:"));
        assert_eq!(harness.automation.call_count().await, 0);
    }

    #[tokio::test]
    async fn counters_track_every_run_for_one_user() {
        let harness = TestHarness::builder()
            .with_responses(vec![
                MockResponse::Outcome(SiteOutcome::succeeded("Timecard signed off")),
                MockResponse::Outcome(SiteOutcome::succeeded("Timecard already signed off")),
                MockResponse::Outcome(SiteOutcome::failed("Login error: invalid password")),
                MockResponse::Error {
                    message: "target page closed".into(),
                    kind: "BrowserError".into(),
                },
                MockResponse::Outcome(SiteOutcome::succeeded("Timecard signed off")),
            ])
            .build()
            .await
            .unwrap();
        let user = harness.enroll("mixed@example.com", "u", "p").await.unwrap();
        let ctx = context(&harness);

        let mut statuses = Vec::new();
        for _ in 0..3 {
            match ctx.run_signoff(user.id).await.unwrap() {
                TaskOutcome::Completed { status, .. } => statuses.push(status),
                other => panic!("expected a completed run, got {other:?}"),
            }
        }

        // A KMS outage fails the run before the automation is reached.
        let flaky = SignoffContext {
            reader: CredentialReader::new(
                harness.db.clone(),
                Arc::new(FlakyDecryptor::transient(harness.kms.clone(), 1)),
            ),
            ..context(&harness)
        };
        assert!(flaky.run_signoff(user.id).await.is_err());

        for _ in 0..2 {
            match ctx.run_signoff(user.id).await.unwrap() {
                TaskOutcome::Completed { status, .. } => statuses.push(status),
                other => panic!("expected a completed run, got {other:?}"),
            }
        }
        assert_eq!(
            statuses,
            vec![
                RunStatus::LoginSuccessSignedOff,
                RunStatus::LoginSuccessAlreadySigned,
                RunStatus::LoginFailedBadCredentials,
                RunStatus::LoginFailedSiteError,
                RunStatus::LoginSuccessSignedOff,
            ]
        );
        assert_eq!(harness.automation.call_count().await, 5);

        let history = runs::runs_for_user(&harness.db, user.id, 10).await.unwrap();
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|run| run.is_complete()));
        assert_eq!(
            history
                .iter()
                .filter(|run| run.status == RunStatus::LoginFailedUnknownError)
                .count(),
            1
        );

        let user = users::get_user(&harness.db, user.id).await.unwrap().unwrap();
        assert_eq!(user.auto_signed_off_count, 2);
        assert_eq!(user.already_signed_off_count, 1);
        assert_eq!(user.failed_login_count, 3);
        assert_eq!(
            user.auto_signed_off_count + user.already_signed_off_count + user.failed_login_count,
            history.len() as i64
        );
        assert_eq!(
            user.last_timecard_check_status,
            Some(RunStatus::LoginSuccessSignedOff)
        );
    }

    #[tokio::test]
    async fn corrupted_credential_is_unknown_error_not_bad_password() {
        let harness = TestHarness::new().await.unwrap();
        let user = harness.enroll("corrupt@example.com", "u", "p").await.unwrap();
        harness
            .db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE credentials SET nonce_password = zeroblob(12)",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        let ctx = context(&harness);

        let err = ctx.run_signoff(user.id).await.unwrap_err();
        assert!(matches!(err, SignoffError::AuthenticationFailure(_)));
        assert!(!err.is_retryable());
        let run = only_run(&harness, user.id).await;
        assert_eq!(run.status, RunStatus::LoginFailedUnknownError);
    }
}
