//! Identity-provider webhook ingress.
//!
//! Verifies the delivery signature, maps the provider's event type onto a bus
//! event, and publishes it with the delivery id as event id. Unlike the `/api`
//! endpoints this one is machine-to-machine and answers with status codes:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 202 | Accepted onto the bus (or an event type we do not consume) |
//! | 400 | Body is not a `{type, data}` object |
//! | 401 | Signature or timestamp check failed |
//! | 503 | The bus is not accepting events; the provider will retry |

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::events::{Event, PublishError, names};
use crate::identity::WebhookError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Why a webhook delivery was not accepted.
#[derive(Debug)]
pub enum WebhookRejection {
    Unverified(WebhookError),
    Malformed(serde_json::Error),
    Unavailable(PublishError),
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unverified(e) => {
                warn!(error = %e, "Rejected identity webhook");
                (StatusCode::UNAUTHORIZED, "invalid signature").into_response()
            }
            Self::Malformed(e) => {
                warn!(error = %e, "Malformed identity webhook");
                (StatusCode::BAD_REQUEST, "malformed payload").into_response()
            }
            Self::Unavailable(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "Could not enqueue identity webhook");
                (StatusCode::SERVICE_UNAVAILABLE, "try again later").into_response()
            }
        }
    }
}

/// Bus event name for a provider event type, if we consume it.
#[must_use]
pub fn bus_event_name(kind: &str) -> Option<&'static str> {
    match kind {
        "user.created" => Some(names::USER_CREATED),
        "user.updated" => Some(names::USER_UPDATED),
        "user.deleted" => Some(names::USER_DELETED),
        _ => None,
    }
}

/// Receive a signed identity-provider event.
#[instrument(skip_all)]
pub async fn identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookRejection> {
    let delivery = state
        .webhooks()
        .verify(&headers, &body)
        .map_err(WebhookRejection::Unverified)?;

    let payload: WebhookBody =
        serde_json::from_slice(&body).map_err(WebhookRejection::Malformed)?;

    let Some(name) = bus_event_name(&payload.kind) else {
        debug!(kind = %payload.kind, delivery_id = %delivery.id, "Ignoring identity event type");
        return Ok(StatusCode::ACCEPTED);
    };

    state
        .bus()
        .publish(Event::new(name, payload.data).with_id(delivery.id.clone()))
        .await
        .map_err(WebhookRejection::Unavailable)?;

    info!(event = name, delivery_id = %delivery.id, "Identity event accepted");
    Ok(StatusCode::ACCEPTED)
}
