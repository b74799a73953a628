//! Caller identity from a trusted request header.

use axum::http::{HeaderMap, HeaderName};

use quickcart_core::UserId;

use super::IdentityGateway;

/// Default header carrying the caller id.
pub const DEFAULT_USER_HEADER: &str = "x-user-id";

/// Reads the caller id from a header set by an authenticating proxy.
///
/// Only use this when the header cannot be set by clients directly.
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    #[must_use]
    pub const fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for HeaderIdentity {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_USER_HEADER))
    }
}

impl IdentityGateway for HeaderIdentity {
    fn caller_identity(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get(&self.header)?
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::new)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_reads_header() {
        let mut headers = HeaderMap::new();
        headers.insert(DEFAULT_USER_HEADER, HeaderValue::from_static(" user_1 "));

        let id = HeaderIdentity::default().caller_identity(&headers);
        assert_eq!(id, Some(UserId::new("user_1")));
    }

    #[test]
    fn test_missing_or_blank_header() {
        let identity = HeaderIdentity::default();
        assert_eq!(identity.caller_identity(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(DEFAULT_USER_HEADER, HeaderValue::from_static(""));
        assert_eq!(identity.caller_identity(&headers), None);
    }
}
