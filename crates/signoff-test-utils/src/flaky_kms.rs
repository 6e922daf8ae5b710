// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! KMS decryptor wrapper that fails a configurable number of calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use zeroize::Zeroizing;

use signoff_core::traits::adapter::PluginAdapter;
use signoff_core::traits::kms::DataKeyDecryptor;
use signoff_core::types::AdapterType;
use signoff_core::SignoffError;

/// Fails the first `failures` decrypt calls, then delegates.
pub struct FlakyDecryptor {
    inner: Arc<dyn DataKeyDecryptor>,
    remaining: AtomicU32,
    transient: bool,
    calls: AtomicU32,
}

impl FlakyDecryptor {
    /// Fail with a transient (network-level) error.
    pub fn transient(inner: Arc<dyn DataKeyDecryptor>, failures: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(failures),
            transient: true,
            calls: AtomicU32::new(0),
        }
    }

    /// Fail with a permanent error such as access denied.
    pub fn denied(inner: Arc<dyn DataKeyDecryptor>, failures: u32) -> Self {
        Self {
            transient: false,
            ..Self::transient(inner, failures)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PluginAdapter for FlakyDecryptor {
    fn name(&self) -> &str {
        "flaky-kms"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Kms
    }
}

#[async_trait]
impl DataKeyDecryptor for FlakyDecryptor {
    async fn decrypt_data_key(&self, wrapped: &[u8]) -> Result<Zeroizing<[u8; 32]>, SignoffError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            let message = if self.transient {
                "dispatch failure: connection reset by peer"
            } else {
                "AccessDeniedException: not authorized to perform kms:Decrypt"
            };
            return Err(SignoffError::Kms {
                message: message.to_string(),
                transient: self.transient,
                source: None,
            });
        }
        self.inner.decrypt_data_key(wrapped).await
    }
}
