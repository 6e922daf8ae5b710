// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin notifier that writes alerts to the log.
//!
//! Email delivery is an external collaborator; deployments that have one
//! implement [`AdminNotifier`] themselves.

use async_trait::async_trait;
use signoff_core::traits::adapter::PluginAdapter;
use signoff_core::{AdapterType, AdminNotifier, SignoffError};
use tracing::warn;

/// Emits each admin alert as a `WARN` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl PluginAdapter for LogNotifier {
    fn name(&self) -> &str {
        "log-notifier"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }
}

#[async_trait]
impl AdminNotifier for LogNotifier {
    async fn send_admin_alert(
        &self,
        subject: &str,
        body: &str,
        details: &serde_json::Value,
    ) -> Result<(), SignoffError> {
        warn!(subject, body, %details, "admin alert");
        Ok(())
    }
}
