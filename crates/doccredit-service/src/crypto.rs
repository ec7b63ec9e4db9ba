//! Cryptographic utilities for webhook verification.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 and return the hex-encoded result (64 characters).
///
/// # Errors
///
/// Returns `InvalidLength` if the key is rejected by the MAC implementation.
/// HMAC accepts keys of any size, so this does not happen for SHA-256.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison.
///
/// Only the length is leaked; the content comparison never short-circuits.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_matches_rfc_4231_case_2() {
        let result = hmac_sha256_hex("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            result,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_sha256_depends_on_message() {
        let a = hmac_sha256_hex("whsec_test", "1700000000.{}").unwrap();
        let b = hmac_sha256_hex("whsec_test", "1700000001.{}").unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_compares_content_and_length() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }
}
