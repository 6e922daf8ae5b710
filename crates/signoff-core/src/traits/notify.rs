// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrator notification adapter trait.

use async_trait::async_trait;

use crate::error::SignoffError;
use crate::traits::adapter::PluginAdapter;

/// Delivers operational alerts to administrators.
#[async_trait]
pub trait AdminNotifier: PluginAdapter {
    /// Sends an alert. `details` is free-form structured context.
    async fn send_admin_alert(
        &self,
        subject: &str,
        body: &str,
        details: &serde_json::Value,
    ) -> Result<(), SignoffError>;
}
