//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`.
//! The signed message is `"{t}.{raw body}"`, keyed with the endpoint secret.
//! Several `v1` entries appear while a secret is being rolled; any match is
//! accepted.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;

use super::WebhookError;

/// Maximum age of a signature (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for signatures from the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// # Errors
    ///
    /// `ParseError` on a malformed pair, a bad timestamp, bad hex, or a
    /// header with no `t` or no `v1`.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Checks the signature header against the raw request body.
    ///
    /// # Errors
    ///
    /// - `ParseError` for a malformed header
    /// - `TimestampOutOfRange` when older than the tolerance
    /// - `InvalidTimestamp` when too far in the future
    /// - `InvalidSignature` when no `v1` entry matches
    pub fn verify(&self, payload: &[u8], header: &str, now: Timestamp) -> Result<(), WebhookError> {
        let header = SignatureHeader::parse(header)?;

        let age = now.as_unix_secs().saturating_sub(header.timestamp);
        if age > self.tolerance_secs {
            return Err(WebhookError::TimestampOutOfRange);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        let expected = compute_signature(self.secret.expose_secret(), header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_eq(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Builds a valid signature header, as the provider would send it.
///
/// Used by the mock provider and by tests that post signed payloads.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret_12345";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::new(SECRET.to_string()))
    }

    // ══════════════════════════════════════════════════════════════
    // Header parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parses_timestamp_and_signatures() {
        let header = SignatureHeader::parse("t=1700000000,v1=abcd,v1=ef01,v0=9999").unwrap();
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.v1_signatures, vec![vec![0xab, 0xcd], vec![0xef, 0x01]]);
    }

    #[test]
    fn rejects_header_without_v1() {
        assert!(matches!(
            SignatureHeader::parse("t=1700000000,v0=abcd"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(SignatureHeader::parse("t=1,v1=zz").is_err());
    }

    #[test]
    fn rejects_missing_timestamp() {
        assert!(SignatureHeader::parse("v1=abcd").is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn accepts_fresh_valid_signature() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs(), PAYLOAD).unwrap();
        assert!(verifier().verify(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_during_rotation() {
        let now = Timestamp::now();
        let good = sign_payload(SECRET, now.as_unix_secs(), PAYLOAD).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", now.as_unix_secs(), "00".repeat(32), good_sig);
        assert!(verifier().verify(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs(), PAYLOAD).unwrap();
        let result = verifier().verify(b"{\"id\":\"evt_2\"}", &header, now);
        assert_eq!(result, Err(WebhookError::InvalidSignature));
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Timestamp::now();
        let header = sign_payload("whsec_other", now.as_unix_secs(), PAYLOAD).unwrap();
        assert_eq!(
            verifier().verify(PAYLOAD, &header, now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_signatures_older_than_five_minutes() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs() - 301, PAYLOAD).unwrap();
        assert_eq!(
            verifier().verify(PAYLOAD, &header, now),
            Err(WebhookError::TimestampOutOfRange)
        );
    }

    #[test]
    fn extreme_header_timestamps_are_rejected_without_overflow() {
        let now = Timestamp::now();
        assert_eq!(
            verifier().verify(PAYLOAD, &format!("t={},v1=abcd", i64::MIN), now),
            Err(WebhookError::TimestampOutOfRange)
        );
        assert_eq!(
            verifier().verify(PAYLOAD, &format!("t={},v1=abcd", i64::MAX), now),
            Err(WebhookError::InvalidTimestamp)
        );
    }

    #[test]
    fn rejects_signatures_from_the_future() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs() + 120, PAYLOAD).unwrap();
        assert_eq!(
            verifier().verify(PAYLOAD, &header, now),
            Err(WebhookError::InvalidTimestamp)
        );
    }

    #[test]
    fn tolerates_small_clock_skew() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs() + 30, PAYLOAD).unwrap();
        assert!(verifier().verify(PAYLOAD, &header, now).is_ok());
    }
}
