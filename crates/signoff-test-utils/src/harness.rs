// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the vault and ledger stack over a temp SQLite
//! database, an in-process KMS, and mock collaborators.

use std::sync::Arc;

use secrecy::SecretString;
use signoff_config::model::{KmsProvider, SignoffConfig};
use signoff_core::{DEFAULT_SITE, SignoffError};
use signoff_storage::models::User;
use signoff_storage::Database;
use signoff_vault::crypto::generate_random_key;
use signoff_vault::{CredentialReader, CredentialWriter, LocalKms};

use crate::mock_automation::{MockAutomation, MockResponse};
use crate::mock_notifier::RecordingNotifier;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<MockResponse>,
    config: SignoffConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            config: SignoffConfig::default(),
        }
    }

    /// Script the mock automation's responses.
    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    /// Start from this configuration. Storage and KMS sections are
    /// overwritten to point at the harness's temp resources.
    pub fn with_config(mut self, config: SignoffConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the harness, creating the temp database and a fresh master key.
    pub async fn build(self) -> Result<TestHarness, SignoffError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| SignoffError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("signoff.db");

        let mut config = self.config;
        config.storage.database_path = db_path.to_string_lossy().into_owned();
        config.kms.provider = KmsProvider::Local;
        let master_key = generate_random_key()?;
        config.kms.local_master_key_hex = Some(hex::encode(&master_key[..]));

        let db = Database::open(&config.storage.database_path).await?;
        let kms = Arc::new(LocalKms::new(master_key));

        Ok(TestHarness {
            writer: CredentialWriter::new(db.clone(), kms.clone()),
            reader: CredentialReader::new(db.clone(), kms.clone()),
            automation: Arc::new(MockAutomation::with_responses(self.responses)),
            notifier: Arc::new(RecordingNotifier::new()),
            db,
            kms,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment.
pub struct TestHarness {
    /// Database on a temp file, removed on drop.
    pub db: Database,
    /// In-process KMS holding both roles.
    pub kms: Arc<LocalKms>,
    pub writer: CredentialWriter,
    pub reader: CredentialReader,
    pub automation: Arc<MockAutomation>,
    pub notifier: Arc<RecordingNotifier>,
    /// Configuration matching the temp resources.
    pub config: SignoffConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default configuration and no scripted responses.
    pub async fn new() -> Result<Self, SignoffError> {
        Self::builder().build().await
    }

    /// Enroll a user with portal credentials on the default site.
    pub async fn enroll(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, SignoffError> {
        let enrollment = self
            .writer
            .enroll(
                email,
                Some("Test"),
                Some("User"),
                DEFAULT_SITE,
                &SecretString::from(username.to_string()),
                &SecretString::from(password.to_string()),
            )
            .await?;
        Ok(enrollment.user)
    }

    /// Replace a user's stored password, bumping the credential version.
    pub async fn rotate_password(
        &self,
        user_id: i64,
        username: &str,
        password: &str,
    ) -> Result<i64, SignoffError> {
        let stored = self
            .writer
            .store(
                user_id,
                DEFAULT_SITE,
                &SecretString::from(username.to_string()),
                &SecretString::from(password.to_string()),
            )
            .await?;
        Ok(stored.dek_version)
    }
}
