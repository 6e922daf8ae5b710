// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portal password acquisition via TTY prompt or SIGNOFF_PORTAL_PASSWORD.

use secrecy::SecretString;
use signoff_core::SignoffError;

/// The environment variable name for providing the portal password.
pub const PORTAL_PASSWORD_ENV_VAR: &str = "SIGNOFF_PORTAL_PASSWORD";

/// Get the portal password from the environment or an interactive prompt.
///
/// Priority:
/// 1. `SIGNOFF_PORTAL_PASSWORD` environment variable (scripts, CI)
/// 2. Interactive TTY prompt via `rpassword`, asked twice
pub fn get_portal_password() -> Result<SecretString, SignoffError> {
    if let Ok(password) = std::env::var(PORTAL_PASSWORD_ENV_VAR)
        && !password.is_empty()
    {
        return Ok(SecretString::from(password));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("Portal password: ");
        let mut first = rpassword::read_password()
            .map_err(|e| SignoffError::Vault(format!("failed to read password: {e}")))?;
        eprint!("Confirm portal password: ");
        let mut second = rpassword::read_password()
            .map_err(|e| SignoffError::Vault(format!("failed to read password: {e}")))?;

        let matches = first == second;
        crate::secret::scrub(&mut second);
        if !matches {
            crate::secret::scrub(&mut first);
            return Err(SignoffError::Vault("passwords do not match".to_string()));
        }
        if first.is_empty() {
            return Err(SignoffError::Vault("empty password not allowed".to_string()));
        }
        return Ok(SecretString::from(first));
    }

    Err(SignoffError::Vault(format!(
        "No portal password provided. Set {PORTAL_PASSWORD_ENV_VAR} or run interactively."
    )))
}
