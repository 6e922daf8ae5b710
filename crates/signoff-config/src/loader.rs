// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./signoff.toml` > `~/.config/signoff/signoff.toml` > `/etc/signoff/signoff.toml`
//! with environment variable overrides via `SIGNOFF_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::{SECTIONS, SignoffConfig};

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<SignoffConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SignoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SignoffConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SignoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SignoffConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment without extracting it.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/signoff/signoff.toml` (system-wide)
/// 3. `~/.config/signoff/signoff.toml` (user XDG config)
/// 4. `./signoff.toml` (local directory)
/// 5. `SIGNOFF_*` environment variables
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SignoffConfig::default()))
        .merge(Toml::file("/etc/signoff/signoff.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("signoff/signoff.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("signoff.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `SIGNOFF_WORKER_MAX_RETRIES` must map to `worker.max_retries`,
/// not `worker.max.retries`.
///
/// `SIGNOFF_CONFIG` and `SIGNOFF_PORTAL_PASSWORD` are read by the CLI, not
/// the config model, so they are skipped here.
fn env_provider() -> Env {
    Env::prefixed("SIGNOFF_")
        .ignore(NON_CONFIG_VARS)
        .filter(|key| is_section_key(&key.as_str().to_ascii_lowercase()))
        .map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

const NON_CONFIG_VARS: &[&str] = &["config", "portal_password"];

fn is_section_key(key: &str) -> bool {
    SECTIONS.iter().any(|(section, _)| {
        key.strip_prefix(section)
            .is_some_and(|rest| rest.starts_with('_'))
    })
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
fn map_env_key(key: &str) -> String {
    for (section, _) in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("worker_max_retries"), "worker.max_retries");
        assert_eq!(map_env_key("kms_key_id"), "kms.key_id");
        assert_eq!(
            map_env_key("kms_decrypt_secret_access_key"),
            "kms.decrypt_secret_access_key"
        );
        assert_eq!(map_env_key("scheduler_use_utc"), "scheduler.use_utc");
        assert_eq!(map_env_key("unknown"), "unknown");
    }

    #[test]
    fn only_section_keys_reach_the_model() {
        assert!(is_section_key("worker_concurrency"));
        assert!(!is_section_key("config"));
        assert!(!is_section_key("workers"));
    }

    #[test]
    fn cli_only_vars_are_ignored() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SIGNOFF_CONFIG", "/tmp/signoff.toml");
            jail.set_env("SIGNOFF_PORTAL_PASSWORD", "hunter2");
            jail.set_env("SIGNOFF_WORKER_CONCURRENCY", "5");
            let config: crate::model::SignoffConfig = figment::Figment::new()
                .merge(figment::providers::Serialized::defaults(
                    crate::model::SignoffConfig::default(),
                ))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.worker.concurrency, 5);
            Ok(())
        });
    }
}
