// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portal automation run as a child process.
//!
//! The configured command receives one JSON login request on stdin and must
//! print one JSON [`SiteOutcome`] on stdout. The child is killed if the
//! calling task is dropped, which is how the soft time limit stops a hung
//! browser.

use std::process::Stdio;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use signoff_config::model::PortalConfig;
use signoff_core::traits::adapter::PluginAdapter;
use signoff_core::{AdapterType, PortalLogin, SignoffAutomation, SignoffError, SiteOutcome};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use zeroize::Zeroizing;

/// Error type name reported when the process itself misbehaves.
pub const PROCESS_ERROR_KIND: &str = "AutomationProcessError";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    domain: &'a str,
    email: &'a str,
    name: Option<&'a str>,
    employee_id: &'a str,
    base_url: &'a str,
    headless: bool,
    slow_mo_ms: u64,
}

/// Serialize a login request into a buffer that is zeroed on drop.
///
/// The encoded length is measured first so the buffer is allocated once and
/// never reallocates while it holds part of the password.
fn encode_request(request: &LoginRequest<'_>) -> Result<Zeroizing<Vec<u8>>, serde_json::Error> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, request)?;
    let mut buf = Zeroizing::new(Vec::with_capacity(counter.0));
    serde_json::to_writer(&mut *buf, request)?;
    Ok(buf)
}

/// A writer that only counts bytes.
struct ByteCounter(usize);

impl std::io::Write for ByteCounter {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0 += bytes.len();
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `portal.automation_command` once per sign-off.
pub struct ProcessAutomation {
    command: String,
    args: Vec<String>,
    base_url: String,
    headless: bool,
    slow_mo_ms: u64,
}

impl ProcessAutomation {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            command: config.automation_command.clone(),
            args: config.automation_args.clone(),
            base_url: config.base_url.clone(),
            headless: config.headless,
            slow_mo_ms: config.slow_mo_ms,
        }
    }

    fn process_error(message: String) -> SignoffError {
        SignoffError::Automation {
            message,
            kind: PROCESS_ERROR_KIND.to_string(),
        }
    }
}

impl PluginAdapter for ProcessAutomation {
    fn name(&self) -> &str {
        "process-automation"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Automation
    }
}

#[async_trait]
impl SignoffAutomation for ProcessAutomation {
    async fn sign_off(&self, login: &PortalLogin) -> Result<SiteOutcome, SignoffError> {
        let request = LoginRequest {
            username: login.username.expose_secret(),
            password: login.password.expose_secret(),
            domain: &login.domain,
            email: &login.email,
            name: login.display_name.as_deref(),
            employee_id: &login.employee_id,
            base_url: &self.base_url,
            headless: self.headless,
            slow_mo_ms: self.slow_mo_ms,
        };
        let input = encode_request(&request)
            .map_err(|e| Self::process_error(format!("failed to encode login request: {e}")))?;

        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Self::process_error(format!(
                    "failed to start automation command `{}`: {e}",
                    self.command
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| Self::process_error(format!("failed to send login request: {e}")))?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }
        drop(input);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::process_error(format!("automation command failed: {e}")))?;
        debug!(status = %output.status, "automation command exited");

        let stdout = String::from_utf8_lossy(&output.stdout);
        match serde_json::from_str::<SiteOutcome>(stdout.trim()) {
            Ok(outcome) => Ok(outcome),
            Err(parse_err) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let exit_code = output.status.code().unwrap_or(-1);
                Err(Self::process_error(format!(
                    "automation command exited with code {exit_code} without a valid result \
                     ({parse_err}): {}",
                    stderr.trim()
                )))
            }
        }
    }
}
