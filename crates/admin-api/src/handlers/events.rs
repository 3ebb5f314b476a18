/*!
 * Event producer surface, workflow execution history, and the live SSE
 * stream.
 *
 * `emit` is the internal producer entry point: input errors come back
 * synchronously, delivery outcomes do not (fire-and-forget past
 * validation).
 */

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use forgehook_dispatch::{EmitReceipt, validator};
use forgehook_domain::job::{QueueJob, QueueStatus};

use crate::auth::AuthUser;
use crate::handlers::{ApiResult, map_error, ok};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    pub event_type: String,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct DryRunResponse {
    pub valid: bool,
    pub errors: Vec<String>,
    pub matched: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `POST /api/webhooks/events/emit`
pub async fn emit_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<EmitRequest>,
) -> ApiResult<EmitReceipt> {
    let receipt = state
        .router
        .emit(&user.user_id, &req.event_type, req.payload)
        .await
        .map_err(map_error)?;

    Ok(ok(receipt))
}

/// `POST /api/webhooks/events/test`
///
/// Dry run: validates the payload and reports how many subscriptions an
/// emit would reach, without enqueueing anything.
pub async fn test_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<EmitRequest>,
) -> ApiResult<DryRunResponse> {
    let errors = validator::validate(&req.event_type, &req.payload);

    let matched = if errors.is_empty() {
        state
            .store()
            .by_owner_and_event(&user.user_id, &req.event_type)
            .await
            .map_err(map_error)?
            .len()
    } else {
        0
    };

    Ok(ok(DryRunResponse { valid: errors.is_empty(), errors, matched }))
}

/// `GET /api/workflows/executions?limit=&offset=`
pub async fn list_executions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ExecutionsQuery>,
) -> ApiResult<Vec<QueueJob>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let jobs = state
        .router
        .shards()
        .queue_for(&user.user_id)
        .recent_jobs(limit, offset)
        .await
        .map_err(map_error)?;

    Ok(ok(jobs))
}

/// `GET /api/workflows/stats`
pub async fn workflow_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<QueueStatus> {
    let status = state
        .router
        .shards()
        .queue_for(&user.user_id)
        .status()
        .await
        .map_err(map_error)?;

    Ok(ok(status))
}

/// `POST /api/workflows/retry-failed`
///
/// Administrative: every failed job in the caller's shard gets a fresh run.
pub async fn retry_failed(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<serde_json::Value> {
    let queue = state.router.shards().queue_for(&user.user_id);
    let flipped = queue.retry_all_failed().await.map_err(map_error)?;
    state.router.shards().wake_shard(&user.user_id).await;

    Ok(ok(serde_json::json!({"retried": flipped})))
}

/// `GET /api/webhooks/stream`
///
/// The caller's live workflow messages as Server-Sent Events, with a
/// heartbeat every 30 seconds.
pub async fn stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notifier().subscribe(&user.user_id);

    let message_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(msg) => Some(Ok::<Event, Infallible>(
            Event::default().json_data(&msg).expect("workflow messages serialize"),
        )),
        Err(e) => {
            warn!("SSE client lagged: {e}");
            None
        }
    });

    let heartbeat = tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(
        Duration::from_secs(30),
    ))
    .map(|_| {
        Ok::<Event, Infallible>(Event::default().event("ping").data(
            forgehook_common::now_ms().to_string(),
        ))
    });

    Sse::new(message_stream.merge(heartbeat)).keep_alive(KeepAlive::default())
}

/// `GET /health` — liveness probe.
pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "forgehook-admin-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `GET /metrics` — Prometheus metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    match forgehook_dispatch::metrics::render_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
