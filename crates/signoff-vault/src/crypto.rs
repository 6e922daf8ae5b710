// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypt/decrypt over the system CSPRNG.
//!
//! Every call to [`encrypt`] generates a fresh random 96-bit nonce. Nonce
//! reuse under one key would break GCM, so callers never supply nonces.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::SecretString;
use signoff_core::SignoffError;
use zeroize::Zeroizing;

/// Required key length in bytes.
pub const KEY_LEN: usize = 32;

/// Encrypt a UTF-8 secret under a 32-byte key.
///
/// Returns `(ciphertext_with_tag, nonce)`. Both must be stored to decrypt.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), SignoffError> {
    seal(key, plaintext.as_bytes())
}

/// Decrypt a secret produced by [`encrypt`].
///
/// Fails closed with [`SignoffError::AuthenticationFailure`] when the key is not
/// 32 bytes, the nonce is not 12 bytes, or the tag does not verify.
pub fn decrypt(ciphertext: &[u8], nonce: &[u8], key: &[u8]) -> Result<SecretString, SignoffError> {
    let plaintext = open(key, nonce, ciphertext)?;
    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| SignoffError::Vault("decrypted secret is not valid UTF-8".to_string()))?;
    Ok(SecretString::from(text.to_string()))
}

/// Seal arbitrary bytes. Shared by [`encrypt`] and the local key wrapper.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), SignoffError> {
    let less_safe = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| SignoffError::Vault("failed to generate random nonce".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    // Seal in place: the buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| SignoffError::Vault("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, nonce_bytes))
}

/// Open bytes sealed by [`seal`]. The plaintext is zeroed on drop.
pub fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, SignoffError> {
    let less_safe = aead_key(key)?;
    let nonce_bytes: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
        SignoffError::AuthenticationFailure(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        ))
    })?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let len = less_safe
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            SignoffError::AuthenticationFailure(
                "tag verification failed: wrong key or corrupted data".to_string(),
            )
        })?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}

fn aead_key(key: &[u8]) -> Result<LessSafeKey, SignoffError> {
    if key.len() != KEY_LEN {
        return Err(SignoffError::AuthenticationFailure(format!(
            "key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| SignoffError::AuthenticationFailure("invalid AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<Zeroizing<[u8; KEY_LEN]>, SignoffError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    SystemRandom::new()
        .fill(&mut key[..])
        .map_err(|_| SignoffError::Vault("failed to generate random key".to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use secrecy::ExposeSecret;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_random_key().unwrap();
        let (ciphertext, nonce) = encrypt("hunter2", &key[..]).unwrap();
        let plaintext = decrypt(&ciphertext, &nonce, &key[..]).unwrap();
        assert_eq!(plaintext.expose_secret(), "hunter2");
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let key = generate_random_key().unwrap();
        let (ct1, nonce1) = encrypt("same input", &key[..]).unwrap();
        let (ct2, nonce2) = encrypt("same input", &key[..]).unwrap();
        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn ciphertext_carries_sixteen_byte_tag() {
        let key = generate_random_key().unwrap();
        let (ciphertext, _) = encrypt("hello", &key[..]).unwrap();
        assert_eq!(ciphertext.len(), 5 + 16);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let key1 = generate_random_key().unwrap();
        let key2 = generate_random_key().unwrap();
        let (ciphertext, nonce) = encrypt("secret", &key1[..]).unwrap();
        let err = decrypt(&ciphertext, &nonce, &key2[..]).unwrap_err();
        assert!(matches!(err, SignoffError::AuthenticationFailure(_)));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = generate_random_key().unwrap();
        let (mut ciphertext, nonce) = encrypt("do not tamper", &key[..]).unwrap();
        ciphertext[0] ^= 0x01;
        let err = decrypt(&ciphertext, &nonce, &key[..]).unwrap_err();
        assert!(matches!(err, SignoffError::AuthenticationFailure(_)));
    }

    #[test]
    fn wrong_nonce_fails_authentication() {
        let key = generate_random_key().unwrap();
        let (ciphertext, mut nonce) = encrypt("secret", &key[..]).unwrap();
        nonce[11] ^= 0xFF;
        let err = decrypt(&ciphertext, &nonce, &key[..]).unwrap_err();
        assert!(matches!(err, SignoffError::AuthenticationFailure(_)));
    }

    #[test]
    fn bad_lengths_fail_closed() {
        let key = generate_random_key().unwrap();
        let (ciphertext, nonce) = encrypt("secret", &key[..]).unwrap();

        let short_key = decrypt(&ciphertext, &nonce, &key[..16]).unwrap_err();
        assert!(matches!(short_key, SignoffError::AuthenticationFailure(_)));

        let short_nonce = decrypt(&ciphertext, &nonce[..8], &key[..]).unwrap_err();
        assert!(matches!(short_nonce, SignoffError::AuthenticationFailure(_)));

        let err = encrypt("secret", &[0u8; 31]).unwrap_err();
        assert!(matches!(err, SignoffError::AuthenticationFailure(_)));
    }

    proptest! {
        #[test]
        fn roundtrip_any_utf8(secret in "\\PC{0,128}") {
            let key = generate_random_key().unwrap();
            let (ciphertext, nonce) = encrypt(&secret, &key[..]).unwrap();
            let plaintext = decrypt(&ciphertext, &nonce, &key[..]).unwrap();
            prop_assert_eq!(plaintext.expose_secret(), secret.as_str());
        }
    }
}
