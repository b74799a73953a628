//! Identity-provider webhook signature verification.
//!
//! Webhooks are signed Svix-style: the signed content is
//! `{svix-id}.{svix-timestamp}.{body}`, the MAC is HMAC-SHA256 keyed with the
//! base64 part of the `whsec_` secret, and `svix-signature` carries one or more
//! space-separated `v1,<base64 mac>` entries (several during key rotation).

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Delivery id header; also the event id on the bus.
pub const ID_HEADER: &str = "svix-id";
/// Seconds since the epoch at signing time.
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
/// Space-separated `v1,<signature>` list.
pub const SIGNATURE_HEADER: &str = "svix-signature";

/// Maximum clock difference accepted, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

const SECRET_PREFIX: &str = "whsec_";

/// Reasons a webhook request is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// A signature header is absent or not ASCII.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// The timestamp header is not an integer.
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance")]
    StaleTimestamp,

    /// No signature matched.
    #[error("signature mismatch")]
    InvalidSignature,

    /// The configured secret is not valid base64.
    #[error("invalid webhook secret")]
    InvalidSecret,
}

/// A verified delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDelivery {
    /// Value of `svix-id`.
    pub id: String,
}

/// Verifies webhook signatures.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl WebhookVerifier {
    /// Create a verifier from a `whsec_`-prefixed (or bare base64) secret.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidSecret` if the secret is not base64.
    pub fn new(secret: &SecretString) -> Result<Self, WebhookError> {
        let encoded = secret.expose_secret();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| WebhookError::InvalidSecret)?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }
        Ok(Self { key })
    }

    /// Verify a delivery against the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] describing the first check that failed.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<VerifiedDelivery, WebhookError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    /// Verify a delivery as if the current time were `now` (epoch seconds).
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] describing the first check that failed.
    pub fn verify_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<VerifiedDelivery, WebhookError> {
        let id = header(headers, ID_HEADER)?;
        let timestamp = header(headers, TIMESTAMP_HEADER)?;
        let signatures = header(headers, SIGNATURE_HEADER)?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;
        if now.abs_diff(ts) > TOLERANCE_SECS.unsigned_abs() {
            return Err(WebhookError::StaleTimestamp);
        }

        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| WebhookError::InvalidSecret)?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);

        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix("v1,"))
            .filter_map(|encoded| STANDARD.decode(encoded).ok())
            .any(|candidate| mac.clone().verify_slice(&candidate).is_ok());

        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        debug!(delivery_id = id, "Webhook signature verified");
        Ok(VerifiedDelivery { id: id.to_owned() })
    }

    /// Sign a payload the way the provider does. Used by tests and local tools.
    #[must_use]
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> String {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return String::new();
        };
        mac.update(format!("{id}.{timestamp}.").as_bytes());
        mac.update(body);
        format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(WebhookError::MissingHeader(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    // base64("quickcart-webhook-test-key")
    const SECRET: &str = "whsec_cXVpY2tjYXJ0LXdlYmhvb2stdGVzdC1rZXk=";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"type":"user.created","data":{"id":"user_1"}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(&SecretString::from(SECRET)).unwrap()
    }

    fn headers(id: &str, timestamp: i64, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers.insert(
            TIMESTAMP_HEADER,
            HeaderValue::from_str(&timestamp.to_string()).unwrap(),
        );
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers
    }

    #[test]
    fn test_valid_signature() {
        let v = verifier();
        let signature = v.sign("msg_1", NOW, BODY);

        let delivery = v.verify_at(&headers("msg_1", NOW, &signature), BODY, NOW + 10).unwrap();
        assert_eq!(delivery.id, "msg_1");
    }

    #[test]
    fn test_any_of_several_signatures() {
        let v = verifier();
        let signature = format!("v1,AAAA v1,bm90LWl0 {}", v.sign("msg_1", NOW, BODY));

        assert!(v.verify_at(&headers("msg_1", NOW, &signature), BODY, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let v = verifier();
        let signature = v.sign("msg_1", NOW, BODY);

        let err = v
            .verify_at(&headers("msg_1", NOW, &signature), b"{}", NOW)
            .unwrap_err();
        assert_eq!(err, WebhookError::InvalidSignature);
    }

    #[test]
    fn test_different_id_rejected() {
        let v = verifier();
        let signature = v.sign("msg_1", NOW, BODY);

        let err = v
            .verify_at(&headers("msg_2", NOW, &signature), BODY, NOW)
            .unwrap_err();
        assert_eq!(err, WebhookError::InvalidSignature);
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let v = verifier();
        let signature = v.sign("msg_1", NOW, BODY);

        let err = v
            .verify_at(&headers("msg_1", NOW, &signature), BODY, NOW + TOLERANCE_SECS + 1)
            .unwrap_err();
        assert_eq!(err, WebhookError::StaleTimestamp);
    }

    #[test]
    fn test_extreme_timestamps_rejected_as_stale() {
        let v = verifier();

        for ts in [i64::MIN, i64::MAX] {
            let signature = v.sign("msg_1", ts, BODY);
            let err = v
                .verify_at(&headers("msg_1", ts, &signature), BODY, NOW)
                .unwrap_err();
            assert_eq!(err, WebhookError::StaleTimestamp, "timestamp {ts}");
        }
    }

    #[test]
    fn test_missing_headers() {
        let v = verifier();
        let err = v.verify_at(&HeaderMap::new(), BODY, NOW).unwrap_err();
        assert_eq!(err, WebhookError::MissingHeader(ID_HEADER));
    }

    #[test]
    fn test_invalid_secret() {
        let err = WebhookVerifier::new(&SecretString::from("whsec_!!!")).unwrap_err();
        assert_eq!(err, WebhookError::InvalidSecret);
    }
}
