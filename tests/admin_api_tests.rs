/*!
 * Admin API surface tests
 *
 * Drive the axum router directly with `tower::ServiceExt::oneshot`: no
 * sockets, no background server. Covers the response envelope, ownership
 * checks, the SSRF rejection at create time, and pagination clamping.
 */

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use forgehook_admin_api::create_router;
use forgehook_common::create_pool;
use forgehook_config::DeliveryConfig;
use forgehook_dispatch::build_engine;

/// Engine + router with the production SSRF guard active.
async fn strict_app() -> Router {
    let pool = create_pool("sqlite::memory:", 1).await.unwrap();
    let router = build_engine(pool, DeliveryConfig::default()).await.unwrap();
    create_router(router)
}

/// Engine + router that tolerates loopback targets (for flows that enqueue).
async fn lenient_app() -> (Router, Arc<forgehook_dispatch::EventRouter>) {
    let pool = create_pool("sqlite::memory:", 1).await.unwrap();
    let config = DeliveryConfig {
        allow_private_targets: true,
        retry_delays_ms: vec![50, 50],
        ..DeliveryConfig::default()
    };
    let engine = build_engine(pool, config).await.unwrap();
    (create_router(Arc::clone(&engine)), engine)
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_body(url: &str) -> Value {
    json!({
        "name": "api hook",
        "url": url,
        "events": ["payment.success"],
    })
}

#[tokio::test]
async fn create_returns_envelope_with_generated_secret() {
    let app = strict_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["owner_id"], "user-1");
    assert_eq!(body["data"]["secret"].as_str().unwrap().len(), 64);
    assert_eq!(body["data"]["max_retries"], 3);
    assert_eq!(body["data"]["is_active"], true);
}

#[tokio::test]
async fn create_rejects_private_target_with_400() {
    let app = strict_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("http://10.0.0.5/x")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Invalid webhook URL"));

    // Nothing was written
    let response = app
        .oneshot(request("GET", "/api/webhooks", Some("user-1"), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = strict_app().await;

    let response = app
        .oneshot(request("GET", "/api/webhooks", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_webhook_is_forbidden() {
    let app = strict_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("owner"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/api/webhooks/{id}"), Some("intruder"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(request(
            "DELETE",
            &format!("/api/webhooks/{id}"),
            Some("intruder"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_webhook_is_not_found() {
    let app = strict_app().await;

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/webhooks/{}", uuid::Uuid::new_v4()),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let app = strict_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/webhooks/{id}"),
            Some("user-1"),
            Some(json!({"name": "renamed", "is_active": false})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "renamed");
    assert_eq!(body["data"]["is_active"], false);

    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/api/webhooks/{id}"), Some("user-1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", &format!("/api/webhooks/{id}"), Some("user-1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_rejects_private_url() {
    let app = strict_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(request(
            "PUT",
            &format!("/api/webhooks/{id}"),
            Some("user-1"),
            Some(json!({"url": "http://192.168.1.1/x"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn regenerate_secret_returns_a_fresh_one() {
    let app = strict_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let original = body["data"]["secret"].as_str().unwrap().to_string();

    let response = app
        .oneshot(request(
            "POST",
            &format!("/api/webhooks/{id}/regenerate-secret"),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rotated = body["data"]["secret"].as_str().unwrap();
    assert_eq!(rotated.len(), 64);
    assert_ne!(rotated, original);
}

#[tokio::test]
async fn emit_rejects_invalid_payload_synchronously() {
    let app = strict_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/webhooks/events/emit",
            Some("user-1"),
            Some(json!({"event_type": "payment.success", "payload": {"userId": "user-1"}})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("amount"));
}

#[tokio::test]
async fn emit_reports_matched_subscriptions() {
    let (app, engine) = lenient_app().await;

    app.clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("http://127.0.0.1:1/unreachable")),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            "POST",
            "/api/webhooks/events/emit",
            Some("user-1"),
            Some(json!({
                "event_type": "payment.success",
                "payload": {"userId": "user-1", "amount": 5, "currency": "USD"},
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["job_ids"].as_array().unwrap().len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_event_is_a_dry_run() {
    let app = strict_app().await;

    app.clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks/events/test",
            Some("user-1"),
            Some(json!({
                "event_type": "payment.success",
                "payload": {"userId": "user-1", "amount": 5, "currency": "USD"},
            })),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["matched"], 1);

    // Nothing was enqueued
    let response = app
        .oneshot(request("GET", "/api/workflows/stats", Some("user-1"), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["pending"], 0);
    assert_eq!(body["data"]["processing"], 0);
}

#[tokio::test]
async fn logs_pagination_clamps_limit() {
    let app = strict_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/webhooks",
            Some("user-1"),
            Some(create_body("https://hooks.example.test/in")),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/webhooks/{id}/logs?limit=5000&offset=0"),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["limit"], 100);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn workflow_stats_shape() {
    let app = strict_app().await;

    let response = app
        .oneshot(request("GET", "/api/workflows/stats", Some("user-1"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    for key in ["pending", "processing", "succeeded", "failed"] {
        assert_eq!(body["data"][key], 0, "missing or nonzero {key}");
    }
}

#[tokio::test]
async fn health_endpoint_needs_no_identity() {
    let app = strict_app().await;

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}
