// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process key wrapping under a configured master key.
//!
//! Wrapped keys are `nonce || ciphertext_with_tag`. Intended for development
//! and tests where no KMS endpoint is reachable.

use async_trait::async_trait;
use ring::aead::NONCE_LEN;
use signoff_core::{
    AdapterType, DataKeyDecryptor, DataKeyGenerator, GeneratedDataKey, PluginAdapter,
    SignoffError,
};
use zeroize::Zeroizing;

use crate::crypto;

/// Key id reported for keys wrapped by [`LocalKms`].
pub const LOCAL_KEY_ID: &str = "local";

/// Master-key wrapper implementing both KMS roles.
pub struct LocalKms {
    master_key: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for LocalKms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKms")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl LocalKms {
    pub fn new(master_key: Zeroizing<[u8; 32]>) -> Self {
        Self { master_key }
    }

    /// Build from a 64-character hex string.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignoffError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| SignoffError::Config(format!("invalid local master key: {e}")))?,
        );
        let mut key = Zeroizing::new([0u8; 32]);
        if bytes.len() != key.len() {
            return Err(SignoffError::Config(format!(
                "local master key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// A throwaway master key.
    pub fn random() -> Result<Self, SignoffError> {
        Ok(Self::new(crypto::generate_random_key()?))
    }
}

#[async_trait]
impl PluginAdapter for LocalKms {
    fn name(&self) -> &str {
        "local-kms"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Kms
    }
}

#[async_trait]
impl DataKeyGenerator for LocalKms {
    fn key_id(&self) -> &str {
        LOCAL_KEY_ID
    }

    async fn generate_data_key(&self) -> Result<GeneratedDataKey, SignoffError> {
        let plaintext = crypto::generate_random_key()?;
        let (ciphertext, nonce) = crypto::seal(&self.master_key[..], &plaintext[..])?;
        let mut wrapped = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wrapped.extend_from_slice(&nonce);
        wrapped.extend_from_slice(&ciphertext);
        Ok(GeneratedDataKey {
            plaintext,
            wrapped,
            key_id: LOCAL_KEY_ID.to_string(),
        })
    }
}

#[async_trait]
impl DataKeyDecryptor for LocalKms {
    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
    ) -> Result<Zeroizing<[u8; 32]>, SignoffError> {
        if wrapped.len() < NONCE_LEN {
            return Err(invalid_ciphertext("wrapped key is truncated"));
        }
        let (nonce, ciphertext) = wrapped.split_at(NONCE_LEN);
        let bytes = crypto::open(&self.master_key[..], nonce, ciphertext)
            .map_err(|_| invalid_ciphertext("wrapped key failed to unwrap"))?;
        let mut key = Zeroizing::new([0u8; 32]);
        if bytes.len() != key.len() {
            return Err(invalid_ciphertext("unwrapped key has the wrong length"));
        }
        key.copy_from_slice(&bytes);
        Ok(key)
    }
}

fn invalid_ciphertext(message: &str) -> SignoffError {
    SignoffError::Kms {
        message: format!("InvalidCiphertextException: {message}"),
        transient: false,
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wrap_unwrap_roundtrip() {
        let kms = LocalKms::random().unwrap();
        let key = kms.generate_data_key().await.unwrap();
        assert_eq!(key.key_id, LOCAL_KEY_ID);
        assert_eq!(key.wrapped.len(), NONCE_LEN + 32 + 16);

        let unwrapped = kms.decrypt_data_key(&key.wrapped).await.unwrap();
        assert_eq!(*unwrapped, *key.plaintext);
    }

    #[tokio::test]
    async fn other_master_key_cannot_unwrap() {
        let a = LocalKms::random().unwrap();
        let b = LocalKms::random().unwrap();
        let key = a.generate_data_key().await.unwrap();
        let err = b.decrypt_data_key(&key.wrapped).await.unwrap_err();
        assert!(matches!(err, SignoffError::Kms { transient: false, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn truncated_wrapped_key_is_rejected() {
        let kms = LocalKms::random().unwrap();
        assert!(kms.decrypt_data_key(&[0u8; 4]).await.is_err());
    }

    #[test]
    fn from_hex_validates_length() {
        assert!(LocalKms::from_hex(&"00".repeat(32)).is_ok());
        assert!(matches!(
            LocalKms::from_hex("abcd"),
            Err(SignoffError::Config(_))
        ));
        assert!(LocalKms::from_hex("zz").is_err());
    }

    #[test]
    fn debug_redacts_master_key() {
        let kms = LocalKms::from_hex(&"ab".repeat(32)).unwrap();
        assert!(!format!("{kms:?}").contains("171"));
    }
}
