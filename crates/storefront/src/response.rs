//! JSON response envelope for the `/api` endpoints.
//!
//! Every endpoint answers HTTP 200; the logical outcome is in `success`.
//!
//! ```json
//! { "success": true, "orders": [...] }
//! { "success": false, "message": "User not authenticated" }
//! ```

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::models::{OrderDetail, User};

/// The `{success, message?, orders?, user?}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<OrderDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Envelope {
    const fn empty(success: bool) -> Self {
        Self {
            success,
            message: None,
            orders: None,
            user: None,
        }
    }

    /// Success with a confirmation message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty(true)
        }
    }

    /// Success carrying an order list.
    #[must_use]
    pub fn orders(orders: Vec<OrderDetail>) -> Self {
        Self {
            orders: Some(orders),
            ..Self::empty(true)
        }
    }

    /// Success carrying a user record.
    #[must_use]
    pub fn user(user: User) -> Self {
        Self {
            user: Some(user),
            ..Self::empty(true)
        }
    }

    /// Logical failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty(false)
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_shape() {
        let json = serde_json::to_value(Envelope::failure("Unauthorized")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "Unauthorized" })
        );
    }

    #[test]
    fn test_empty_order_list_is_present() {
        let json = serde_json::to_value(Envelope::orders(Vec::new())).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "orders": [] }));
    }
}
