/*!
 * Admin API Service
 *
 * REST surface for the webhook subsystem.
 *
 * ## Routes
 *
 * ### Webhooks (owner-scoped)
 * - `POST   /api/webhooks` - Create webhook (URL vetted, secret generated)
 * - `GET    /api/webhooks?is_active=` - List caller's webhooks
 * - `GET    /api/webhooks/{id}` - Get one webhook
 * - `PUT    /api/webhooks/{id}` - Update
 * - `DELETE /api/webhooks/{id}` - Delete (jobs cascade, logs retained)
 * - `POST   /api/webhooks/{id}/test` - Enqueue a test delivery
 * - `POST   /api/webhooks/{id}/regenerate-secret` - Rotate the HMAC secret
 * - `GET    /api/webhooks/{id}/logs?limit=&offset=&success=` - Delivery log
 * - `POST   /api/webhooks/logs/{log_id}/retry` - Replay a logged payload
 *
 * ### Events
 * - `POST /api/webhooks/events/emit` - Internal producer entry point
 * - `POST /api/webhooks/events/test` - Dry-run validation + match count
 *
 * ### Workflows
 * - `GET  /api/workflows/executions?limit=&offset=` - Execution history
 * - `GET  /api/workflows/stats` - Queue status counts
 * - `POST /api/workflows/retry-failed` - Re-run every failed job
 *
 * ### Live + infra
 * - `GET /api/webhooks/stream` - SSE stream of workflow progress
 * - `GET /health` - Liveness probe
 * - `GET /metrics` - Prometheus metrics
 *
 * ## Authentication
 *
 * The platform gateway authenticates callers and forwards the user id in
 * `X-User-Id`; this service trusts that header and scopes every operation
 * to it. Responses use the `{"success": true, "data": ...}` envelope;
 * validation errors are 400, foreign rows 403, missing rows 404.
 */

pub mod auth;
pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use forgehook_dispatch::EventRouter;

/// Build the full admin router on top of a wired delivery engine.
pub fn create_router(router: Arc<EventRouter>) -> Router {
    let state = AppState { router };

    let webhook_routes = Router::new()
        .route("/webhooks", post(handlers::webhooks::create_webhook))
        .route("/webhooks", get(handlers::webhooks::list_webhooks))
        .route("/webhooks/stream", get(handlers::events::stream))
        .route("/webhooks/events/emit", post(handlers::events::emit_event))
        .route("/webhooks/events/test", post(handlers::events::test_event))
        .route(
            "/webhooks/logs/{log_id}/retry",
            post(handlers::webhooks::retry_delivery),
        )
        .route("/webhooks/{id}", get(handlers::webhooks::get_webhook))
        .route("/webhooks/{id}", put(handlers::webhooks::update_webhook))
        .route("/webhooks/{id}", delete(handlers::webhooks::delete_webhook))
        .route("/webhooks/{id}/test", post(handlers::webhooks::test_webhook))
        .route(
            "/webhooks/{id}/regenerate-secret",
            post(handlers::webhooks::regenerate_secret),
        )
        .route("/webhooks/{id}/logs", get(handlers::webhooks::list_logs));

    let workflow_routes = Router::new()
        .route("/workflows/executions", get(handlers::events::list_executions))
        .route("/workflows/stats", get(handlers::events::workflow_stats))
        .route("/workflows/retry-failed", post(handlers::events::retry_failed));

    Router::new()
        .route("/health", get(handlers::events::health_check))
        .route("/metrics", get(handlers::events::metrics_handler))
        .nest("/api", webhook_routes.merge(workflow_routes).with_state(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
