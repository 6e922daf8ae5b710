// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot admin commands: `enqueue`, `run`, `set-credentials`, and
//! `config show`.

use secrecy::{ExposeSecret, SecretString};
use signoff_config::model::SignoffConfig;
use signoff_core::SignoffError;
use signoff_cron::schedule::today;
use signoff_cron::{EnqueueReport, enqueue_eligible, enqueue_if_signoff_day};
use signoff_storage::queries::users;
use signoff_vault::{CredentialWriter, encrypt_client, get_portal_password, mask_secret};
use signoff_worker::{LogNotifier, RetryPolicy, TaskOutcome};
use tracing::info;

use crate::serve::{build_context, open_database};

/// Runs `signoff enqueue`.
///
/// Without `force`, nothing is queued unless today is a sign-off Sunday.
pub async fn run_enqueue(config: &SignoffConfig, force: bool) -> Result<(), SignoffError> {
    let db = open_database(config).await?;
    let max_attempts = RetryPolicy::from_config(&config.worker).max_attempts();
    let date = today(config.scheduler.use_utc);

    let report = if force {
        Some(enqueue_eligible(&db, &LogNotifier, max_attempts).await?)
    } else {
        enqueue_if_signoff_day(
            &db,
            &LogNotifier,
            date,
            config.scheduler.anchor_date,
            max_attempts,
        )
        .await?
    };

    match report {
        Some(report) => println!("{}", format_report(&report)),
        None => println!("{date} is not a sign-off Sunday; nothing enqueued (use --force to override)"),
    }
    db.close().await
}

fn format_report(report: &EnqueueReport) -> String {
    let mut out = format!("Enqueued {} sign-off task(s)", report.enqueued.len());
    if !report.without_credentials.is_empty() {
        out.push_str(&format!(
            "\nSkipped {} user(s) without credentials:",
            report.without_credentials.len()
        ));
        for (id, email) in &report.without_credentials {
            out.push_str(&format!("\n  {email} (ID: {id})"));
        }
    }
    out
}

/// Runs `signoff run <email>`: one sign-off in the foreground.
pub async fn run_once(config: &SignoffConfig, email: &str) -> Result<(), SignoffError> {
    let db = open_database(config).await?;
    let user = users::get_user_by_email(&db, email)
        .await?
        .ok_or_else(|| SignoffError::UserNotFound(email.to_string()))?;

    let ctx = build_context(config, db.clone()).await?;
    info!(user_id = user.id, "running signoff in the foreground");
    let outcome = ctx.run_signoff(user.id).await?;
    println!("{}", describe_outcome(&outcome));

    drop(ctx);
    db.close().await
}

fn describe_outcome(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::UserMissing => "User no longer exists; nothing to do".to_string(),
        TaskOutcome::NeedsPassword => {
            "Skipped: user must submit a new password (set-credentials)".to_string()
        }
        TaskOutcome::MissingCredentials => {
            "Skipped: no credentials stored; an admin alert was raised".to_string()
        }
        TaskOutcome::Completed { run_id, status } => format!("Run {run_id} finished: {status}"),
    }
}

/// Runs `signoff set-credentials`.
///
/// The password comes from `SIGNOFF_PORTAL_PASSWORD` or a TTY prompt, never
/// from the command line. Only the encrypt-role KMS client is built.
pub async fn run_set_credentials(
    config: &SignoffConfig,
    email: &str,
    username: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<(), SignoffError> {
    let username = SecretString::from(username.to_string());
    let password = get_portal_password()?;

    let db = open_database(config).await?;
    let generator = encrypt_client(&config.kms).await?;
    let writer = CredentialWriter::new(db.clone(), generator);

    let enrollment = writer
        .enroll(
            email,
            first_name,
            last_name,
            &config.portal.site,
            &username,
            &password,
        )
        .await?;

    println!(
        "Stored credentials for {} on {} (username {}, version {})",
        enrollment.user.email,
        config.portal.site,
        mask_secret(username.expose_secret()),
        enrollment.stored.dek_version
    );

    drop(writer);
    db.close().await
}

/// Runs `signoff config show`.
pub fn show_config(config: &SignoffConfig) -> Result<(), SignoffError> {
    let rendered = toml::to_string_pretty(&redacted(config))
        .map_err(|e| SignoffError::Config(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

/// A copy of `config` with KMS secrets masked.
fn redacted(config: &SignoffConfig) -> SignoffConfig {
    let mut config = config.clone();
    let kms = &mut config.kms;
    for secret in [
        &mut kms.encrypt_secret_access_key,
        &mut kms.decrypt_secret_access_key,
        &mut kms.local_master_key_hex,
    ] {
        if let Some(value) = secret.as_mut() {
            *value = mask_secret(value);
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use signoff_core::RunStatus;

    #[test]
    fn report_lists_users_without_credentials() {
        let report = EnqueueReport {
            enqueued: vec![1, 2],
            without_credentials: vec![(3, "c@example.com".into())],
        };
        let text = format_report(&report);
        assert!(text.starts_with("Enqueued 2 sign-off task(s)"));
        assert!(text.contains("c@example.com (ID: 3)"));
    }

    #[test]
    fn empty_report_is_one_line() {
        let text = format_report(&EnqueueReport::default());
        assert_eq!(text, "Enqueued 0 sign-off task(s)");
    }

    #[test]
    fn completed_outcome_names_status() {
        let text = describe_outcome(&TaskOutcome::Completed {
            run_id: "r-1".into(),
            status: RunStatus::LoginSuccessAlreadySigned,
        });
        assert_eq!(text, "Run r-1 finished: login_success_already_signed");
    }

    #[test]
    fn redacted_config_masks_kms_secrets() {
        let mut config = SignoffConfig::default();
        config.kms.decrypt_secret_access_key = Some("wJalrXUtnFEMI/K7MDENG".into());
        config.kms.local_master_key_hex = Some("ab".repeat(32));

        let shown = redacted(&config);
        assert_eq!(
            shown.kms.decrypt_secret_access_key.as_deref(),
            Some("wJal...DENG")
        );
        assert!(shown.kms.encrypt_secret_access_key.is_none());
        assert_ne!(shown.kms.local_master_key_hex, config.kms.local_master_key_hex);
    }

    #[test]
    fn show_config_renders_toml() {
        assert!(show_config(&SignoffConfig::default()).is_ok());
    }
}
