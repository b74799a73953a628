//! Caller identity from identity-provider session tokens.
//!
//! The provider issues short-lived JWTs whose `sub` claim is the user id. The
//! token arrives either as `Authorization: Bearer <jwt>` (API clients) or in the
//! `__session` cookie (browsers). Production keys are RS256 public keys; HS256
//! shared secrets are accepted for development.

use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use quickcart_core::UserId;

use super::IdentityGateway;

/// Cookie the provider's browser SDK stores the session token in.
pub const SESSION_COOKIE: &str = "__session";

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies session JWTs and returns their subject.
pub struct JwtIdentity {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentity")
            .field("algorithms", &self.validation.algorithms)
            .field("key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl JwtIdentity {
    /// Verify RS256 tokens with a PEM-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be parsed.
    pub fn from_rsa_pem(
        pem: &SecretString,
        issuer: Option<&str>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_rsa_pem(pem.expose_secret().as_bytes())?;
        Ok(Self::with_key(key, Algorithm::RS256, issuer))
    }

    /// Verify HS256 tokens with a shared secret.
    #[must_use]
    pub fn from_secret(secret: &SecretString, issuer: Option<&str>) -> Self {
        let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
        Self::with_key(key, Algorithm::HS256, issuer)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(algorithm);
        // Session tokens carry an authorized-party claim, not an audience.
        validation.validate_aud = false;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { key, validation }
    }

    fn verify(&self, token: &str) -> Option<UserId> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) if !data.claims.sub.trim().is_empty() => Some(UserId::new(data.claims.sub)),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}

impl IdentityGateway for JwtIdentity {
    fn caller_identity(&self, headers: &HeaderMap) -> Option<UserId> {
        bearer_token(headers)
            .or_else(|| session_cookie(headers))
            .and_then(|token| self.verify(token))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    use super::*;

    const SECRET: &str = "test-secret-with-enough-entropy-1234567890";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        exp: i64,
        iss: &'a str,
    }

    fn token(sub: &str, iss: &str, exp_offset: i64) -> String {
        let claims = TestClaims {
            sub,
            exp: chrono::Utc::now().timestamp() + exp_offset,
            iss,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn identity(issuer: Option<&str>) -> JwtIdentity {
        JwtIdentity::from_secret(&SecretString::from(SECRET), issuer)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_valid_bearer_token() {
        let headers = bearer(&token("user_1", "https://id.example.com", 3600));
        assert_eq!(
            identity(None).caller_identity(&headers),
            Some(UserId::new("user_1"))
        );
    }

    #[test]
    fn test_session_cookie() {
        let mut headers = HeaderMap::new();
        let cookie = format!(
            "theme=dark; __session={}; other=1",
            token("user_2", "https://id.example.com", 3600)
        );
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());

        assert_eq!(
            identity(None).caller_identity(&headers),
            Some(UserId::new("user_2"))
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let headers = bearer(&token("user_1", "https://id.example.com", -3600));
        assert_eq!(identity(None).caller_identity(&headers), None);
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let headers = bearer(&token("user_1", "https://evil.example.com", 3600));
        assert_eq!(
            identity(Some("https://id.example.com")).caller_identity(&headers),
            None
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let headers = bearer(&token("user_1", "https://id.example.com", 3600));
        let other = JwtIdentity::from_secret(&SecretString::from("another-secret-value"), None);
        assert_eq!(other.caller_identity(&headers), None);
    }

    #[test]
    fn test_no_credentials() {
        assert_eq!(identity(None).caller_identity(&HeaderMap::new()), None);
        assert_eq!(identity(None).caller_identity(&bearer("not-a-jwt")), None);
    }
}
