// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the timecard sign-off service.
//!
//! TOML configuration with strict key checking (`deny_unknown_fields`), XDG
//! file lookup, and `SIGNOFF_*` environment overrides. Errors are reported as
//! miette diagnostics that point into the file that caused them.
//!
//! # Usage
//!
//! ```no_run
//! use signoff_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Workers: {}", config.worker.concurrency);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError, ConfigSource};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{KmsProvider, SignoffConfig};
pub use validation::parse_cron;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment errors become diagnostics with typo suggestions; validation errors
/// are pointed at the file and line that set the offending key.
pub fn load_and_validate() -> Result<SignoffConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from a specific TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SignoffConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![ConfigSource::new("<inline>", toml_content)]
    })
}

/// Load configuration from an explicit file path (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<SignoffConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![ConfigSource::new(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Validate a loaded config. Sources are only read once something failed.
fn finish(
    loaded: Result<SignoffConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<ConfigSource>,
) -> Result<SignoffConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => match validation::validate_config(&config) {
            Ok(()) => Ok(config),
            Err(errors) => {
                let sources = sources();
                Err(errors.into_iter().map(|e| e.located(&sources)).collect())
            }
        },
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// TOML files in merge precedence order, highest first.
fn collect_toml_sources() -> Vec<ConfigSource> {
    let local = std::env::current_dir()
        .map(|d| d.join("signoff.toml"))
        .unwrap_or_else(|_| "signoff.toml".into());
    let user = dirs::config_dir().map(|d| d.join("signoff").join("signoff.toml"));
    let system = std::path::PathBuf::from("/etc/signoff/signoff.toml");

    [Some(local), user, Some(system)]
        .into_iter()
        .flatten()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some(ConfigSource::new(path.display().to_string(), content))
        })
        .collect()
}
