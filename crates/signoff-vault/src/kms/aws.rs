// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS KMS clients, one per principal.
//!
//! The encrypt principal's IAM policy allows only `kms:GenerateDataKey` and the
//! decrypt principal's only `kms:Decrypt`. Each client is built from its own
//! credentials so a compromised web tier cannot unwrap stored data keys.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_kms::Client;
use aws_sdk_kms::config::retry::RetryConfig;
use aws_sdk_kms::config::timeout::TimeoutConfig;
use aws_sdk_kms::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use signoff_config::model::KmsConfig;
use signoff_core::{
    AdapterType, DataKeyDecryptor, DataKeyGenerator, GeneratedDataKey, PluginAdapter,
    SignoffError,
};
use tracing::debug;
use zeroize::Zeroizing;

/// Service error codes worth retrying at the task layer.
const TRANSIENT_CODES: &[&str] = &[
    "KMSInternalException",
    "DependencyTimeoutException",
    "ThrottlingException",
];

#[derive(Clone, Copy)]
enum Role {
    Encrypt,
    Decrypt,
}

async fn build_client(config: &KmsConfig, role: Role) -> Client {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    let timeout = Duration::from_secs(config.timeout_secs);
    let mut builder = aws_sdk_kms::config::Builder::from(&sdk_config)
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(timeout)
                .connect_timeout(timeout)
                .build(),
        )
        // Retries belong to the task queue, not the request path.
        .retry_config(RetryConfig::disabled());

    let (access_key, secret_key, label) = match role {
        Role::Encrypt => (
            &config.encrypt_access_key_id,
            &config.encrypt_secret_access_key,
            "signoff-kms-encrypt",
        ),
        Role::Decrypt => (
            &config.decrypt_access_key_id,
            &config.decrypt_secret_access_key,
            "signoff-kms-decrypt",
        ),
    };
    if let (Some(access_key), Some(secret_key)) = (access_key, secret_key) {
        builder = builder.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            label,
        ));
    }

    Client::from_conf(builder.build())
}

fn map_sdk_err<E, R>(operation: &str, err: SdkError<E, R>) -> SignoffError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => service
            .err()
            .code()
            .is_some_and(|code| TRANSIENT_CODES.contains(&code)),
        _ => false,
    };
    SignoffError::Kms {
        message: format!("{operation} failed: {}", DisplayErrorContext(err)),
        transient,
        source: None,
    }
}

fn key_from_blob(blob: Option<&Blob>, operation: &str) -> Result<Zeroizing<[u8; 32]>, SignoffError> {
    let bytes = blob.map(Blob::as_ref).ok_or_else(|| SignoffError::Kms {
        message: format!("{operation} response contained no plaintext"),
        transient: false,
        source: None,
    })?;
    let mut key = Zeroizing::new([0u8; 32]);
    if bytes.len() != key.len() {
        return Err(SignoffError::Kms {
            message: format!("{operation} returned a {}-byte key, expected 32", bytes.len()),
            transient: false,
            source: None,
        });
    }
    key.copy_from_slice(bytes);
    Ok(key)
}

/// Mints data keys with the encrypt principal.
pub struct AwsKmsEncryptor {
    client: Client,
    key_id: String,
}

impl AwsKmsEncryptor {
    pub async fn new(config: &KmsConfig) -> Result<Self, SignoffError> {
        let key_id = config
            .key_id
            .clone()
            .ok_or_else(|| SignoffError::Config("kms.key_id is required".to_string()))?;
        Ok(Self {
            client: build_client(config, Role::Encrypt).await,
            key_id,
        })
    }
}

#[async_trait]
impl PluginAdapter for AwsKmsEncryptor {
    fn name(&self) -> &str {
        "aws-kms-encrypt"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Kms
    }
}

#[async_trait]
impl DataKeyGenerator for AwsKmsEncryptor {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn generate_data_key(&self) -> Result<GeneratedDataKey, SignoffError> {
        let output = self
            .client
            .generate_data_key()
            .key_id(&self.key_id)
            .key_spec(DataKeySpec::Aes256)
            .send()
            .await
            .map_err(|e| map_sdk_err("GenerateDataKey", e))?;

        let plaintext = key_from_blob(output.plaintext(), "GenerateDataKey")?;
        let wrapped = output
            .ciphertext_blob()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| SignoffError::Kms {
                message: "GenerateDataKey response contained no ciphertext".to_string(),
                transient: false,
                source: None,
            })?;
        let key_id = output.key_id().unwrap_or(&self.key_id).to_string();
        debug!(key_id = %key_id, wrapped_len = wrapped.len(), "generated data key");

        Ok(GeneratedDataKey {
            plaintext,
            wrapped,
            key_id,
        })
    }
}

/// Unwraps data keys with the decrypt principal.
pub struct AwsKmsDecryptor {
    client: Client,
}

impl AwsKmsDecryptor {
    pub async fn new(config: &KmsConfig) -> Result<Self, SignoffError> {
        Ok(Self {
            client: build_client(config, Role::Decrypt).await,
        })
    }
}

#[async_trait]
impl PluginAdapter for AwsKmsDecryptor {
    fn name(&self) -> &str {
        "aws-kms-decrypt"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Kms
    }
}

#[async_trait]
impl DataKeyDecryptor for AwsKmsDecryptor {
    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
    ) -> Result<Zeroizing<[u8; 32]>, SignoffError> {
        let output = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(wrapped.to_vec()))
            .send()
            .await
            .map_err(|e| map_sdk_err("Decrypt", e))?;
        key_from_blob(output.plaintext(), "Decrypt")
    }
}
