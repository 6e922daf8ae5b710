// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key management adapter traits.
//!
//! Generation and decryption are separate traits so a process can hold only
//! the role it needs. The enrollment path never receives a decryptor and the
//! worker never receives a generator.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::error::SignoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::GeneratedDataKey;

/// Mints new data encryption keys under a configured master key.
#[async_trait]
pub trait DataKeyGenerator: PluginAdapter {
    /// Identifier of the master key new data keys are wrapped under.
    fn key_id(&self) -> &str;

    /// Generates a fresh 256-bit data key, returning both the plaintext and
    /// the wrapped form.
    async fn generate_data_key(&self) -> Result<GeneratedDataKey, SignoffError>;
}

/// Unwraps data keys previously produced by a [`DataKeyGenerator`].
#[async_trait]
pub trait DataKeyDecryptor: PluginAdapter {
    /// Returns the 32-byte plaintext key for a wrapped data key.
    ///
    /// Network failures are reported as transient [`SignoffError::Kms`] errors.
    async fn decrypt_data_key(&self, wrapped: &[u8])
    -> Result<Zeroizing<[u8; 32]>, SignoffError>;
}
