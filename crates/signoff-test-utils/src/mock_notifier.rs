// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin notifier that captures alerts for assertion in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use signoff_core::traits::adapter::PluginAdapter;
use signoff_core::traits::notify::AdminNotifier;
use signoff_core::types::AdapterType;
use signoff_core::SignoffError;

/// One captured admin alert.
#[derive(Debug, Clone, PartialEq)]
pub struct SentAlert {
    pub subject: String,
    pub body: String,
    pub details: serde_json::Value,
}

/// Records every alert. Can be switched to fail delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentAlert>>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose deliveries always fail.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub async fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

impl PluginAdapter for RecordingNotifier {
    fn name(&self) -> &str {
        "recording-notifier"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }
}

#[async_trait]
impl AdminNotifier for RecordingNotifier {
    async fn send_admin_alert(
        &self,
        subject: &str,
        body: &str,
        details: &serde_json::Value,
    ) -> Result<(), SignoffError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignoffError::Internal("mail relay unavailable".into()));
        }
        self.sent.lock().await.push(SentAlert {
            subject: subject.to_string(),
            body: body.to_string(),
            details: details.clone(),
        });
        Ok(())
    }
}
