// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as time limit ordering, provider-specific required keys, and the
//! scheduler anchor weekday.

use std::str::FromStr;

use chrono::{Datelike, Weekday};

use crate::diagnostic::ConfigError;
use crate::model::{KmsProvider, SignoffConfig};

/// One day. Queue locks are `hard_time_limit_secs` plus a grace period.
const MAX_HARD_TIME_LIMIT_SECS: u64 = 24 * 60 * 60;

/// One week between deliveries of a failing task.
const MAX_RETRY_BACKOFF_SECS: u64 = 7 * 24 * 60 * 60;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SignoffConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    validate_kms(config, &mut errors);

    if config.portal.site.trim().is_empty() {
        errors.push(ConfigError::invalid("portal.site", "must not be empty"));
    }
    if config.portal.automation_command.trim().is_empty() {
        errors.push(ConfigError::invalid("portal.automation_command", "must not be empty"));
    }

    let worker = &config.worker;
    if worker.concurrency < 1 {
        errors.push(ConfigError::invalid("worker.concurrency", "must be at least 1"));
    }
    if worker.soft_time_limit_secs == 0 {
        errors.push(ConfigError::invalid("worker.soft_time_limit_secs", "must be positive"));
    }
    if worker.hard_time_limit_secs == 0 {
        errors.push(ConfigError::invalid("worker.hard_time_limit_secs", "must be positive"));
    }
    if worker.soft_time_limit_secs >= worker.hard_time_limit_secs {
        errors.push(ConfigError::invalid(
            "worker.soft_time_limit_secs",
            format!(
                "({}) must be less than worker.hard_time_limit_secs ({})",
                worker.soft_time_limit_secs, worker.hard_time_limit_secs
            ),
        ));
    }
    if worker.hard_time_limit_secs > MAX_HARD_TIME_LIMIT_SECS {
        errors.push(ConfigError::invalid(
            "worker.hard_time_limit_secs",
            format!("must be at most {MAX_HARD_TIME_LIMIT_SECS}"),
        ));
    }
    if worker.retry_backoff_max_secs > MAX_RETRY_BACKOFF_SECS {
        errors.push(ConfigError::invalid(
            "worker.retry_backoff_max_secs",
            format!("must be at most {MAX_RETRY_BACKOFF_SECS}"),
        ));
    }
    if worker.retry_backoff_base_secs > worker.retry_backoff_max_secs {
        errors.push(ConfigError::invalid(
            "worker.retry_backoff_base_secs",
            "must not exceed worker.retry_backoff_max_secs",
        ));
    }

    let scheduler = &config.scheduler;
    if scheduler.anchor_date.weekday() != Weekday::Sun {
        errors.push(ConfigError::invalid(
            "scheduler.anchor_date",
            format!(
                "{} is a {}, expected a Sunday",
                scheduler.anchor_date,
                scheduler.anchor_date.weekday()
            ),
        ));
    }
    if let Err(e) = parse_cron(&scheduler.cron) {
        errors.push(ConfigError::invalid(
            "scheduler.cron",
            format!("`{}` is invalid: {e}", scheduler.cron),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_kms(config: &SignoffConfig, errors: &mut Vec<ConfigError>) {
    let kms = &config.kms;
    match kms.provider {
        KmsProvider::Aws => {
            if kms.key_id.as_deref().is_none_or(|k| k.trim().is_empty()) {
                errors.push(ConfigError::invalid("kms.key_id", "is required for the aws provider"));
            }
            if kms.region.trim().is_empty() {
                errors.push(ConfigError::invalid("kms.region", "must not be empty"));
            }
            for (role, id, secret) in [
                (
                    "encrypt",
                    &kms.encrypt_access_key_id,
                    &kms.encrypt_secret_access_key,
                ),
                (
                    "decrypt",
                    &kms.decrypt_access_key_id,
                    &kms.decrypt_secret_access_key,
                ),
            ] {
                if id.is_some() != secret.is_some() {
                    errors.push(ConfigError::invalid(
                        &format!("kms.{role}_access_key_id"),
                        format!("must be set together with kms.{role}_secret_access_key"),
                    ));
                }
            }
        }
        KmsProvider::Local => match kms.local_master_key_hex.as_deref() {
            Some(hex_key) if hex_key.len() == 64 && hex::decode(hex_key).is_ok() => {}
            _ => errors.push(ConfigError::invalid(
                "kms.local_master_key_hex",
                "must be 64 hex characters for the local provider",
            )),
        },
    }
    if kms.timeout_secs == 0 {
        errors.push(ConfigError::invalid("kms.timeout_secs", "must be positive"));
    }
}

/// Parse a cron expression, accepting the 5-field form by prepending seconds.
pub fn parse_cron(expr: &str) -> Result<cron::Schedule, cron::error::Error> {
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    cron::Schedule::from_str(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local_config() -> SignoffConfig {
        let mut config = SignoffConfig::default();
        config.kms.provider = KmsProvider::Local;
        config.kms.local_master_key_hex = Some("ab".repeat(32));
        config
    }

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors.iter().any(
            |e| matches!(e, ConfigError::Invalid { .. }) && e.to_string().contains(needle),
        )
    }

    #[test]
    fn local_provider_with_master_key_validates() {
        assert!(validate_config(&local_config()).is_ok());
    }

    #[test]
    fn default_config_requires_aws_key_id() {
        let errors = validate_config(&SignoffConfig::default()).unwrap_err();
        assert!(has_message(&errors, "kms.key_id"));
    }

    #[test]
    fn aws_provider_with_key_id_validates() {
        let mut config = SignoffConfig::default();
        config.kms.key_id = Some("alias/timecard".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn half_configured_principal_fails_validation() {
        let mut config = SignoffConfig::default();
        config.kms.key_id = Some("alias/timecard".into());
        config.kms.decrypt_access_key_id = Some("AKIA".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "kms.decrypt_access_key_id"));
    }

    #[test]
    fn short_master_key_fails_validation() {
        let mut config = local_config();
        config.kms.local_master_key_hex = Some("abcd".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "local_master_key_hex"));
    }

    #[test]
    fn soft_limit_must_be_below_hard_limit() {
        let mut config = local_config();
        config.worker.soft_time_limit_secs = 300;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "must be less than"));
    }

    #[test]
    fn oversized_limits_fail_validation() {
        let mut config = local_config();
        config.worker.hard_time_limit_secs = u64::MAX;
        config.worker.retry_backoff_max_secs = u64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "`worker.hard_time_limit_secs` must be at most 86400"));
        assert!(has_message(&errors, "`worker.retry_backoff_max_secs` must be at most 604800"));
    }

    #[test]
    fn anchor_must_be_sunday() {
        let mut config = local_config();
        config.scheduler.anchor_date = NaiveDate::from_ymd_opt(2025, 12, 22).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "expected a Sunday"));
    }

    #[test]
    fn invalid_cron_fails_validation() {
        let mut config = local_config();
        config.scheduler.cron = "every sunday".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "scheduler.cron"));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = local_config();
        config.worker.concurrency = 0;
        config.storage.database_path = " ".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn five_field_cron_is_accepted() {
        assert!(parse_cron("30 8 * * Sun").is_ok());
        assert!(parse_cron("0 30 8 * * Sun").is_ok());
    }
}
