// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for plaintext buffers that leave a `Zeroizing`/`SecretString` wrapper.

use rand::Rng;
use zeroize::Zeroize;

/// Shortest filler written over a scrubbed buffer.
pub const MIN_FILLER_LEN: usize = 8;
/// Longest filler written over a scrubbed buffer.
pub const MAX_FILLER_LEN: usize = 64;

/// Zero a plaintext string, then refill it with a random-length run of NULs so
/// its final length says nothing about the secret it held.
pub fn scrub(value: &mut String) {
    value.zeroize();
    let len = rand::thread_rng().gen_range(MIN_FILLER_LEN..=MAX_FILLER_LEN);
    value.extend(std::iter::repeat_n('\0', len));
}

/// Mask a secret for display, keeping only the first and last four characters.
///
/// Values shorter than 10 characters are fully masked.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_replaces_content_with_nul_filler() {
        for _ in 0..50 {
            let mut secret = String::from("correct horse battery staple");
            scrub(&mut secret);
            assert!(secret.chars().all(|c| c == '\0'));
            assert!((MIN_FILLER_LEN..=MAX_FILLER_LEN).contains(&secret.len()));
        }
    }

    #[test]
    fn mask_secret_long_value() {
        assert_eq!(mask_secret("jane.doe@corp.example"), "jane...mple");
    }

    #[test]
    fn mask_secret_short_value() {
        assert_eq!(mask_secret("jdoe"), "****");
    }

    #[test]
    fn mask_secret_exact_boundary() {
        assert_eq!(mask_secret("1234567890"), "1234...7890");
    }

    #[test]
    fn mask_secret_handles_multibyte() {
        assert_eq!(mask_secret("ééééxxxxxxéééé"), "éééé...éééé");
    }
}
