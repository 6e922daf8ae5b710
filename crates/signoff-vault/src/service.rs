// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential lifecycle: envelope encryption on write, decryption on read.
//!
//! Each credential row has its own data key. The key is minted by KMS, used
//! once to encrypt the username and password under independent nonces, and
//! only its wrapped form is stored. Plaintext keys live in `Zeroizing`
//! buffers and are dropped before any database write.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use signoff_core::{DataKeyDecryptor, DataKeyGenerator, SignoffError};
use signoff_storage::models::{NewCredential, User};
use signoff_storage::queries::credentials::{self, StoredCredential};
use signoff_storage::queries::users;
use signoff_storage::Database;
use tracing::{debug, info};

use crate::crypto;

/// Plaintext credential returned by [`CredentialReader::decrypt`].
///
/// `dek_version` is the version of the row that was actually decrypted.
#[derive(Debug)]
pub struct DecryptedCredential {
    pub credential_id: String,
    pub dek_version: i64,
    pub username: SecretString,
    pub password: SecretString,
}

/// Result of enrolling a user's portal login.
#[derive(Debug)]
pub struct Enrollment {
    pub user: User,
    pub stored: StoredCredential,
}

/// Write side of the vault. Holds only the encrypt-role KMS client.
pub struct CredentialWriter {
    db: Database,
    kms: Arc<dyn DataKeyGenerator>,
}

impl CredentialWriter {
    pub fn new(db: Database, kms: Arc<dyn DataKeyGenerator>) -> Self {
        Self { db, kms }
    }

    /// Encrypt and store (or replace) the login for `user_id` on `site`.
    ///
    /// The first submission stores version 1; each later one increments it.
    pub async fn store(
        &self,
        user_id: i64,
        site: &str,
        username: &SecretString,
        password: &SecretString,
    ) -> Result<StoredCredential, SignoffError> {
        let new = {
            let data_key = self.kms.generate_data_key().await?;
            let (enc_username, nonce_username) =
                crypto::encrypt(username.expose_secret(), &data_key.plaintext[..])?;
            let (enc_password, nonce_password) =
                crypto::encrypt(password.expose_secret(), &data_key.plaintext[..])?;
            NewCredential {
                user_id,
                site: site.to_string(),
                enc_username,
                nonce_username: nonce_username.to_vec(),
                enc_password,
                nonce_password: nonce_password.to_vec(),
                dek_wrapped: data_key.wrapped,
                kms_key_id: data_key.key_id,
            }
            // `data_key.plaintext` is zeroed here.
        };

        let stored = credentials::upsert_credential(&self.db, new).await?;
        info!(
            user_id,
            site,
            dek_version = stored.dek_version,
            "stored encrypted credentials"
        );
        Ok(stored)
    }

    /// Create the user on first submission, then store their login.
    pub async fn enroll(
        &self,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        site: &str,
        username: &SecretString,
        password: &SecretString,
    ) -> Result<Enrollment, SignoffError> {
        let user = users::get_or_create_user(&self.db, email, first_name, last_name).await?;
        let stored = self.store(user.id, site, username, password).await?;
        let user = users::get_user(&self.db, user.id)
            .await?
            .ok_or_else(|| SignoffError::UserNotFound(user.id.to_string()))?;
        Ok(Enrollment { user, stored })
    }
}

/// Read side of the vault. Holds only the decrypt-role KMS client.
pub struct CredentialReader {
    db: Database,
    kms: Arc<dyn DataKeyDecryptor>,
}

impl CredentialReader {
    pub fn new(db: Database, kms: Arc<dyn DataKeyDecryptor>) -> Self {
        Self { db, kms }
    }

    /// Load and decrypt the login for `user_id` on `site`.
    ///
    /// Errors: [`SignoffError::CredentialNotFound`] when no row exists, a
    /// [`SignoffError::Kms`] when the data key cannot be unwrapped, and
    /// [`SignoffError::AuthenticationFailure`] when a ciphertext fails its tag.
    pub async fn decrypt(
        &self,
        user_id: i64,
        site: &str,
    ) -> Result<DecryptedCredential, SignoffError> {
        let credential = credentials::get_credential(&self.db, user_id, site)
            .await?
            .ok_or_else(|| SignoffError::CredentialNotFound {
                user_id,
                site: site.to_string(),
            })?;

        let (username, password) = {
            let data_key = self.kms.decrypt_data_key(&credential.dek_wrapped).await?;
            let username = crypto::decrypt(
                &credential.enc_username,
                &credential.nonce_username,
                &data_key[..],
            )?;
            let password = crypto::decrypt(
                &credential.enc_password,
                &credential.nonce_password,
                &data_key[..],
            )?;
            (username, password)
        };

        debug!(
            user_id,
            site,
            dek_version = credential.dek_version,
            "decrypted credentials"
        );
        Ok(DecryptedCredential {
            credential_id: credential.id,
            dek_version: credential.dek_version,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kms::LocalKms;
    use signoff_core::DEFAULT_SITE;

    async fn setup() -> (Database, CredentialWriter, CredentialReader) {
        let db = Database::open_in_memory().await.unwrap();
        let kms = Arc::new(LocalKms::random().unwrap());
        let writer = CredentialWriter::new(db.clone(), kms.clone());
        let reader = CredentialReader::new(db.clone(), kms);
        (db, writer, reader)
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn enroll_then_decrypt_roundtrip() {
        let (_db, writer, reader) = setup().await;
        let enrollment = writer
            .enroll(
                "Jane@Example.com",
                Some("Jane"),
                Some("Doe"),
                DEFAULT_SITE,
                &secret("jdoe"),
                &secret("hunter2"),
            )
            .await
            .unwrap();
        assert_eq!(enrollment.user.email, "jane@example.com");
        assert_eq!(enrollment.stored.dek_version, 1);

        let decrypted = reader.decrypt(enrollment.user.id, DEFAULT_SITE).await.unwrap();
        assert_eq!(decrypted.username.expose_secret(), "jdoe");
        assert_eq!(decrypted.password.expose_secret(), "hunter2");
        assert_eq!(decrypted.dek_version, 1);
        assert_eq!(decrypted.credential_id, enrollment.stored.credential_id);
    }

    #[tokio::test]
    async fn resubmission_bumps_version_and_replaces_secret() {
        let (_db, writer, reader) = setup().await;
        let first = writer
            .enroll("a@example.com", None, None, DEFAULT_SITE, &secret("a"), &secret("old"))
            .await
            .unwrap();
        let second = writer
            .store(first.user.id, DEFAULT_SITE, &secret("a"), &secret("new"))
            .await
            .unwrap();
        assert_eq!(second.dek_version, first.stored.dek_version + 1);

        let decrypted = reader.decrypt(first.user.id, DEFAULT_SITE).await.unwrap();
        assert_eq!(decrypted.password.expose_secret(), "new");
        assert_eq!(decrypted.dek_version, 2);
    }

    #[tokio::test]
    async fn stored_row_holds_no_plaintext() {
        let (db, writer, _reader) = setup().await;
        let enrollment = writer
            .enroll(
                "p@example.com",
                None,
                None,
                DEFAULT_SITE,
                &secret("plainuser"),
                &secret("plainpass"),
            )
            .await
            .unwrap();
        let row = credentials::get_credential(&db, enrollment.user.id, DEFAULT_SITE)
            .await
            .unwrap()
            .unwrap();
        for blob in [&row.enc_username, &row.enc_password, &row.dek_wrapped] {
            assert!(!blob.windows(9).any(|w| w == b"plainuser" || w == b"plainpass"));
        }
        assert_ne!(row.nonce_username, row.nonce_password);
        assert_eq!(row.kms_key_id, "local");
    }

    #[tokio::test]
    async fn missing_credential_is_credential_not_found() {
        let (db, _writer, reader) = setup().await;
        let user = users::create_user(&db, "none@example.com", None, None)
            .await
            .unwrap();
        let err = reader.decrypt(user.id, DEFAULT_SITE).await.unwrap_err();
        assert!(matches!(err, SignoffError::CredentialNotFound { .. }));
        assert!(err.is_credential_error());
    }

    #[tokio::test]
    async fn corrupted_ciphertext_is_authentication_failure() {
        let (db, writer, reader) = setup().await;
        let enrollment = writer
            .enroll("t@example.com", None, None, DEFAULT_SITE, &secret("u"), &secret("p"))
            .await
            .unwrap();
        let credential_id = enrollment.stored.credential_id.clone();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE credentials SET enc_password = x'00112233445566778899aabbccddeeff00' \
                     WHERE id = ?1",
                    [credential_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = reader
            .decrypt(enrollment.user.id, DEFAULT_SITE)
            .await
            .unwrap_err();
        assert!(matches!(err, SignoffError::AuthenticationFailure(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn reader_with_other_master_key_fails_with_kms_error() {
        let (db, writer, _reader) = setup().await;
        let enrollment = writer
            .enroll("k@example.com", None, None, DEFAULT_SITE, &secret("u"), &secret("p"))
            .await
            .unwrap();
        let stranger = CredentialReader::new(db, Arc::new(LocalKms::random().unwrap()));
        let err = stranger
            .decrypt(enrollment.user.id, DEFAULT_SITE)
            .await
            .unwrap_err();
        assert!(matches!(err, SignoffError::Kms { .. }));
    }
}
