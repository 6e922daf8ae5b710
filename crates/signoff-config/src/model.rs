// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the timecard sign-off service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Every `signoff.toml` section with the keys it accepts.
pub const SECTIONS: &[(&str, &[&str])] = &[
    ("agent", &["log_level"]),
    ("storage", &["database_path", "wal_mode"]),
    (
        "kms",
        &[
            "provider",
            "key_id",
            "region",
            "encrypt_access_key_id",
            "encrypt_secret_access_key",
            "decrypt_access_key_id",
            "decrypt_secret_access_key",
            "timeout_secs",
            "local_master_key_hex",
        ],
    ),
    (
        "portal",
        &[
            "site",
            "base_url",
            "default_domain",
            "automation_command",
            "automation_args",
            "headless",
            "slow_mo_ms",
        ],
    ),
    (
        "worker",
        &[
            "concurrency",
            "soft_time_limit_secs",
            "hard_time_limit_secs",
            "max_retries",
            "retry_backoff_base_secs",
            "retry_backoff_max_secs",
            "poll_interval_ms",
        ],
    ),
    ("scheduler", &["enabled", "cron", "anchor_date", "use_utc"]),
];

/// Top-level sign-off configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignoffConfig {
    /// Process-level settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key management service settings.
    #[serde(default)]
    pub kms: KmsConfig,

    /// Timecard portal and automation collaborator settings.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Task worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Fortnightly enqueue scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("signoff").join("signoff.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("signoff.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Which key management backend wraps data keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KmsProvider {
    /// AWS KMS with separate encrypt and decrypt principals.
    #[default]
    Aws,
    /// In-process master key. For development and tests only.
    Local,
}

/// Key management service configuration.
///
/// The encrypt principal may only call `GenerateDataKey`; the decrypt
/// principal may only call `Decrypt`. Leaving a principal's keys unset falls
/// back to the ambient AWS credential chain for that role.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KmsConfig {
    #[serde(default)]
    pub provider: KmsProvider,

    /// Master key id or alias data keys are generated under.
    #[serde(default)]
    pub key_id: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub encrypt_access_key_id: Option<String>,

    #[serde(default)]
    pub encrypt_secret_access_key: Option<String>,

    #[serde(default)]
    pub decrypt_access_key_id: Option<String>,

    #[serde(default)]
    pub decrypt_secret_access_key: Option<String>,

    /// Per-call timeout for KMS operations.
    #[serde(default = "default_kms_timeout_secs")]
    pub timeout_secs: u64,

    /// Hex-encoded 32-byte master key for the `local` provider.
    #[serde(default)]
    pub local_master_key_hex: Option<String>,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            provider: KmsProvider::default(),
            key_id: None,
            region: default_region(),
            encrypt_access_key_id: None,
            encrypt_secret_access_key: None,
            decrypt_access_key_id: None,
            decrypt_secret_access_key: None,
            timeout_secs: default_kms_timeout_secs(),
            local_master_key_hex: None,
        }
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_kms_timeout_secs() -> u64 {
    10
}

/// Timecard portal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    /// Site key credentials are stored under.
    #[serde(default = "default_site")]
    pub site: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Login domain passed to the automation with every login.
    #[serde(default = "default_domain")]
    pub default_domain: String,

    /// Executable that performs the browser automation.
    #[serde(default = "default_automation_command")]
    pub automation_command: String,

    #[serde(default)]
    pub automation_args: Vec<String>,

    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default)]
    pub slow_mo_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            base_url: default_base_url(),
            default_domain: default_domain(),
            automation_command: default_automation_command(),
            automation_args: Vec::new(),
            headless: default_headless(),
            slow_mo_ms: 0,
        }
    }
}

fn default_site() -> String {
    signoff_core::DEFAULT_SITE.to_string()
}

fn default_base_url() -> String {
    "https://timecard.example.com".to_string()
}

fn default_domain() -> String {
    "MC Network".to_string()
}

fn default_automation_command() -> String {
    "signoff-portal".to_string()
}

fn default_headless() -> bool {
    true
}

/// Task worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for the automation call, leaving time to flush the ledger.
    #[serde(default = "default_soft_time_limit_secs")]
    pub soft_time_limit_secs: u64,

    /// Wall-clock limit after which a task is abandoned.
    #[serde(default = "default_hard_time_limit_secs")]
    pub hard_time_limit_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_base_secs")]
    pub retry_backoff_base_secs: u64,

    #[serde(default = "default_retry_backoff_max_secs")]
    pub retry_backoff_max_secs: u64,

    /// Idle sleep between empty dequeues.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            soft_time_limit_secs: default_soft_time_limit_secs(),
            hard_time_limit_secs: default_hard_time_limit_secs(),
            max_retries: default_max_retries(),
            retry_backoff_base_secs: default_retry_backoff_base_secs(),
            retry_backoff_max_secs: default_retry_backoff_max_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_soft_time_limit_secs() -> u64 {
    240
}

fn default_hard_time_limit_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_base_secs() -> u64 {
    2
}

fn default_retry_backoff_max_secs() -> u64 {
    600
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Fortnightly enqueue scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Cron expression for when the fortnightly check fires. Accepts 5, 6, or 7 fields.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// A Sunday on which sign-off runs. Runs repeat every 14 days from here.
    #[serde(default = "default_anchor_date")]
    pub anchor_date: NaiveDate,

    /// Evaluate the cron expression and calendar in UTC instead of local time.
    #[serde(default)]
    pub use_utc: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            cron: default_cron(),
            anchor_date: default_anchor_date(),
            use_utc: false,
        }
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_cron() -> String {
    "0 30 8 * * Sun".to_string()
}

/// Default fortnight anchor, a Sunday.
pub fn default_anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 21).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Weekday};

    #[test]
    fn defaults_match_worker_limits() {
        let config = SignoffConfig::default();
        assert_eq!(config.worker.soft_time_limit_secs, 240);
        assert_eq!(config.worker.hard_time_limit_secs, 300);
        assert_eq!(config.worker.max_retries, 3);
        assert_eq!(config.worker.retry_backoff_max_secs, 600);
    }

    #[test]
    fn default_anchor_is_a_sunday() {
        let anchor = default_anchor_date();
        assert_eq!(anchor.weekday(), Weekday::Sun);
        assert_eq!(anchor.to_string(), "2025-12-21");
    }

    #[test]
    fn portal_defaults() {
        let portal = PortalConfig::default();
        assert_eq!(portal.site, "timecard_portal");
        assert_eq!(portal.default_domain, "MC Network");
        assert!(portal.headless);
    }

    #[test]
    fn kms_provider_parses_lowercase() {
        let kms: KmsConfig = toml::from_str("provider = \"local\"").unwrap();
        assert_eq!(kms.provider, KmsProvider::Local);
        assert_eq!(kms.timeout_secs, 10);
    }

    #[test]
    fn section_table_matches_model() {
        let mut config = SignoffConfig::default();
        let kms = &mut config.kms;
        kms.key_id = Some("k".into());
        kms.encrypt_access_key_id = Some("k".into());
        kms.encrypt_secret_access_key = Some("k".into());
        kms.decrypt_access_key_id = Some("k".into());
        kms.decrypt_secret_access_key = Some("k".into());
        kms.local_master_key_hex = Some("k".into());

        let value = toml::Value::try_from(&config).unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.len(), SECTIONS.len());
        for (section, keys) in SECTIONS {
            let mut actual: Vec<&str> = table[*section]
                .as_table()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect();
            let mut expected = keys.to_vec();
            actual.sort_unstable();
            expected.sort_unstable();
            assert_eq!(actual, expected, "keys of [{section}]");
        }
    }

    #[test]
    fn anchor_date_parses_from_toml() {
        let scheduler: SchedulerConfig = toml::from_str("anchor_date = \"2026-01-04\"").unwrap();
        assert_eq!(scheduler.anchor_date.to_string(), "2026-01-04");
        assert_eq!(scheduler.cron, "0 30 8 * * Sun");
    }
}
