//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` value is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the
//! endpoint's signing secret.

use chrono::{DateTime, Utc};

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No `t=` element.
    #[error("missing timestamp")]
    MissingTimestamp,

    /// `t=` is not an integer.
    #[error("malformed timestamp")]
    MalformedTimestamp,

    /// No `v1=` element.
    #[error("no v1 signatures")]
    NoSignatures,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance: {age_seconds}s")]
    OutsideTolerance {
        /// Age of the signature in seconds (negative if in the future).
        age_seconds: i64,
    },

    /// No signature matched.
    #[error("signature mismatch")]
    Mismatch,

    /// The MAC could not be computed.
    #[error("hmac failure")]
    Hmac,
}

/// Verify a webhook payload against its signature header.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }

    let age_seconds = now.timestamp() - signed_at;
    if age_seconds.abs() > tolerance_seconds {
        return Err(SignatureError::OutsideTolerance { age_seconds });
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"))
        .map_err(|_| SignatureError::Hmac)?;

    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &str = r#"{"id":"evt_1"}"#;

    fn header_at(timestamp: i64, body: &str) -> String {
        let sig = hmac_sha256_hex(SECRET, &format!("{timestamp}.{body}")).unwrap();
        format!("t={timestamp},v1={sig}")
    }

    #[test]
    fn accepts_valid_signature() {
        let now = Utc::now();
        let header = header_at(now.timestamp(), BODY);
        assert_eq!(verify_signature(BODY, &header, SECRET, 300, now), Ok(()));
    }

    #[test]
    fn accepts_any_matching_v1() {
        let now = Utc::now();
        let header = format!("{},v1=deadbeef", header_at(now.timestamp(), BODY));
        assert_eq!(verify_signature(BODY, &header, SECRET, 300, now), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let now = Utc::now();
        let header = header_at(now.timestamp(), BODY);
        assert_eq!(
            verify_signature(r#"{"id":"evt_2"}"#, &header, SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let now = Utc::now();
        let header = header_at(now.timestamp() - 301, BODY);
        assert!(matches!(
            verify_signature(BODY, &header, SECRET, 300, now),
            Err(SignatureError::OutsideTolerance { age_seconds: 301 })
        ));
    }

    #[test]
    fn rejects_malformed_headers() {
        let now = Utc::now();
        assert_eq!(
            verify_signature(BODY, "v1=abc", SECRET, 300, now),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(BODY, "t=soon,v1=abc", SECRET, 300, now),
            Err(SignatureError::MalformedTimestamp)
        );
        assert_eq!(
            verify_signature(BODY, &format!("t={}", now.timestamp()), SECRET, 300, now),
            Err(SignatureError::NoSignatures)
        );
    }
}
