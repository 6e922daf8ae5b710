// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portal automation adapter trait.

use async_trait::async_trait;

use crate::error::SignoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{PortalLogin, SiteOutcome};

/// Logs into the timecard portal and performs the sign-off.
///
/// Implementations return `Ok` with an unsuccessful [`SiteOutcome`] when the
/// portal reports a failure, and `Err` only when the automation itself broke.
#[async_trait]
pub trait SignoffAutomation: PluginAdapter {
    async fn sign_off(&self, login: &PortalLogin) -> Result<SiteOutcome, SignoffError>;
}
