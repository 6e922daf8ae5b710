// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope-encrypted credential vault for the timecard sign-off service.
//!
//! Every credential row is encrypted under its own AES-256-GCM data key.
//! Data keys are minted and unwrapped by a key management service with
//! separate encrypt and decrypt principals; only the wrapped key is stored.

pub mod crypto;
pub mod kms;
pub mod prompt;
pub mod secret;
pub mod service;

pub use kms::{LocalKms, decrypt_client, encrypt_client};
pub use prompt::get_portal_password;
pub use secret::{mask_secret, scrub};
pub use service::{CredentialReader, CredentialWriter, DecryptedCredential, Enrollment};
