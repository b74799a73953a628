//! Identity webhook ingress and user sync end to end.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};

use quickcart_integration_tests::TestContext;
use quickcart_storefront::events::names;
use quickcart_storefront::identity::webhook::{ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use quickcart_storefront::services::SyncPolicy;

fn user_event(kind: &str, data: &Value) -> Value {
    json!({"type": kind, "data": data, "object": "event"})
}

fn ada() -> Value {
    json!({
        "id": "user_ada",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "image_url": "https://img.example.com/ada.png",
        "email_addresses": [{"email_address": "ada@example.com"}],
    })
}

#[tokio::test]
async fn test_user_lifecycle() {
    let ctx = TestContext::new();

    let resp = ctx
        .post_webhook("msg_1", &user_event("user.created", &ada()))
        .await;
    assert_eq!(resp.status, StatusCode::ACCEPTED);
    assert_eq!(ctx.deliver_events().await, 0);

    let user = ctx.get("/api/user/data", Some("user_ada")).await;
    assert_eq!(user.body["user"]["name"], "Ada Lovelace");
    assert_eq!(user.body["user"]["email"], "ada@example.com");
    assert_eq!(user.body["user"]["cartItems"], json!({}));

    let update = json!({"id": "user_ada", "first_name": "Augusta", "last_name": "King"});
    ctx.post_webhook("msg_2", &user_event("user.updated", &update))
        .await;
    assert_eq!(ctx.deliver_events().await, 0);

    let user = ctx.get("/api/user/data", Some("user_ada")).await;
    assert_eq!(user.body["user"]["name"], "Augusta King");
    // Absent fields keep their stored values.
    assert_eq!(user.body["user"]["email"], "ada@example.com");

    ctx.post_webhook(
        "msg_3",
        &user_event("user.deleted", &json!({"id": "user_ada", "deleted": true})),
    )
    .await;
    assert_eq!(ctx.deliver_events().await, 0);

    let user = ctx.get("/api/user/data", Some("user_ada")).await;
    assert_eq!(user.body["success"], false);
}

#[tokio::test]
async fn test_delivery_id_becomes_event_id() {
    let ctx = TestContext::new();

    ctx.post_webhook("msg_42", &user_event("user.created", &ada()))
        .await;

    let events = ctx.bus.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "msg_42");
    assert_eq!(events[0].name, names::USER_CREATED);
}

#[tokio::test]
async fn test_duplicate_created_delivery_is_harmless() {
    let ctx = TestContext::new();

    ctx.post_webhook("msg_1", &user_event("user.created", &ada()))
        .await;
    ctx.post_webhook("msg_1", &user_event("user.created", &ada()))
        .await;

    assert_eq!(ctx.deliver_events().await, 0);
    assert_eq!(
        ctx.get("/api/user/data", Some("user_ada")).await.body["success"],
        true
    );
}

#[tokio::test]
async fn test_update_for_unknown_user_fails_delivery() {
    let ctx = TestContext::new();

    ctx.post_webhook(
        "msg_1",
        &user_event("user.updated", &json!({"id": "nobody", "first_name": "X"})),
    )
    .await;

    assert_eq!(ctx.deliver_events().await, 1);
}

#[tokio::test]
async fn test_strict_policy_rejects_incomplete_user() {
    let ctx = TestContext::with_policy(SyncPolicy::Strict);

    ctx.post_webhook(
        "msg_1",
        &user_event("user.created", &json!({"id": "user_min"})),
    )
    .await;

    assert_eq!(ctx.deliver_events().await, 1);
    assert_eq!(
        ctx.get("/api/user/data", Some("user_min")).await.body["success"],
        false
    );
}

#[tokio::test]
async fn test_lenient_policy_defaults_missing_fields() {
    let ctx = TestContext::new();

    ctx.post_webhook(
        "msg_1",
        &user_event("user.created", &json!({"id": "user_min"})),
    )
    .await;
    assert_eq!(ctx.deliver_events().await, 0);

    let user = ctx.get("/api/user/data", Some("user_min")).await;
    assert_eq!(user.body["user"]["name"], "Anonymous");
    assert_eq!(user.body["user"]["email"], "");
}

#[tokio::test]
async fn test_unconsumed_type_is_accepted_and_dropped() {
    let ctx = TestContext::new();

    let resp = ctx
        .post_webhook("msg_1", &user_event("session.created", &json!({"id": "s"})))
        .await;

    assert_eq!(resp.status, StatusCode::ACCEPTED);
    assert!(ctx.bus.events().is_empty());
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let ctx = TestContext::new();
    let body = user_event("user.created", &ada()).to_string();

    let request = Request::post("/api/webhooks/identity")
        .header(ID_HEADER, "msg_1")
        .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
        .header(SIGNATURE_HEADER, "v1,AAAA")
        .body(Body::from(body))
        .unwrap();
    let resp = ctx.send(request).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(ctx.bus.events().is_empty());
}

#[tokio::test]
async fn test_unsigned_delivery_is_rejected() {
    let ctx = TestContext::new();

    let resp = ctx
        .post_json(
            "/api/webhooks/identity",
            None,
            &user_event("user.created", &ada()),
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let ctx = TestContext::new();

    let resp = ctx.post_webhook("msg_1", &json!(["not", "an", "event"])).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bus_down_asks_provider_to_retry() {
    let ctx = TestContext::with_closed_bus();

    let resp = ctx
        .post_webhook("msg_1", &user_event("user.created", &ada()))
        .await;

    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}
