// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! KMS client construction.
//!
//! Clients are built once at process startup and passed to the services that
//! need them. The enrollment path gets only a generator; the worker gets only
//! a decryptor.

pub mod aws;
pub mod local;

use std::sync::Arc;

use signoff_config::model::{KmsConfig, KmsProvider};
use signoff_core::{DataKeyDecryptor, DataKeyGenerator, SignoffError};
use tracing::info;

pub use aws::{AwsKmsDecryptor, AwsKmsEncryptor};
pub use local::LocalKms;

fn local_kms(config: &KmsConfig) -> Result<LocalKms, SignoffError> {
    let hex_key = config.local_master_key_hex.as_deref().ok_or_else(|| {
        SignoffError::Config("kms.local_master_key_hex is required for the local provider".into())
    })?;
    LocalKms::from_hex(hex_key)
}

/// Build the encrypt-role client for the configured provider.
pub async fn encrypt_client(config: &KmsConfig) -> Result<Arc<dyn DataKeyGenerator>, SignoffError> {
    info!(provider = ?config.provider, role = "encrypt", "initializing KMS client");
    match config.provider {
        KmsProvider::Aws => Ok(Arc::new(AwsKmsEncryptor::new(config).await?)),
        KmsProvider::Local => Ok(Arc::new(local_kms(config)?)),
    }
}

/// Build the decrypt-role client for the configured provider.
pub async fn decrypt_client(config: &KmsConfig) -> Result<Arc<dyn DataKeyDecryptor>, SignoffError> {
    info!(provider = ?config.provider, role = "decrypt", "initializing KMS client");
    match config.provider {
        KmsProvider::Aws => Ok(Arc::new(AwsKmsDecryptor::new(config).await?)),
        KmsProvider::Local => Ok(Arc::new(local_kms(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> KmsConfig {
        KmsConfig {
            provider: KmsProvider::Local,
            local_master_key_hex: Some("11".repeat(32)),
            ..KmsConfig::default()
        }
    }

    #[tokio::test]
    async fn local_roles_share_master_key() {
        let config = local_config();
        let generator = encrypt_client(&config).await.unwrap();
        let decryptor = decrypt_client(&config).await.unwrap();

        let key = generator.generate_data_key().await.unwrap();
        let unwrapped = decryptor.decrypt_data_key(&key.wrapped).await.unwrap();
        assert_eq!(*unwrapped, *key.plaintext);
        assert_eq!(generator.key_id(), "local");
    }

    #[tokio::test]
    async fn local_provider_without_key_is_config_error() {
        let config = KmsConfig {
            provider: KmsProvider::Local,
            ..KmsConfig::default()
        };
        assert!(matches!(
            decrypt_client(&config).await,
            Err(SignoffError::Config(_))
        ));
    }
}
