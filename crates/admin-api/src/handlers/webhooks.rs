/*!
 * Webhook CRUD, test-send, secret rotation, and log retrieval
 *
 * Every operation checks that the caller owns the subject webhook:
 * missing rows are 404, foreign rows are 403.
 */

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use forgehook_common::validate_target_url_with;
use forgehook_domain::log::{DeliveryLog, LogStatus};
use forgehook_domain::webhook::{
    CreateWebhookRequest, UpdateWebhookRequest, Webhook, WebhookResponse,
};

use crate::auth::AuthUser;
use crate::handlers::{ApiError, ApiResult, api_error, map_error, ok};
use crate::state::AppState;

/// Max log rows per page.
const MAX_LOG_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// true -> success rows only, false -> failed rows only
    pub success: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LogsPage {
    pub logs: Vec<DeliveryLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct SecretResponse {
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct TestSendResponse {
    pub job_id: Uuid,
}

/// Fetch a webhook and require that `user` owns it.
async fn owned_webhook(state: &AppState, user: &AuthUser, id: Uuid) -> Result<Webhook, ApiError> {
    let webhook = state
        .store()
        .by_id(id)
        .await
        .map_err(map_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Webhook not found"))?;

    if webhook.owner_id != user.user_id {
        return Err(api_error(StatusCode::FORBIDDEN, "Not your webhook"));
    }
    Ok(webhook)
}

/// Reject target URLs the delivery engine would refuse to call.
fn check_url(state: &AppState, url: &str) -> Result<(), ApiError> {
    validate_target_url_with(url, state.router.config().allow_private_targets).map_err(|reason| {
        api_error(StatusCode::BAD_REQUEST, format!("Invalid webhook URL: {reason}"))
    })
}

/// `POST /api/webhooks`
pub async fn create_webhook(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<super::ApiResponse<WebhookResponse>>), ApiError> {
    payload
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Validation error: {e}")))?;

    check_url(&state, &payload.url)?;

    let webhook = state
        .store()
        .create(&user.user_id, payload)
        .await
        .map_err(map_error)?;

    Ok((StatusCode::CREATED, ok(WebhookResponse::from(webhook))))
}

/// `GET /api/webhooks?is_active=`
pub async fn list_webhooks(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<WebhookResponse>> {
    let hooks = state
        .store()
        .by_owner(&user.user_id, query.is_active.unwrap_or(false))
        .await
        .map_err(map_error)?;

    Ok(ok(hooks.into_iter().map(WebhookResponse::from).collect()))
}

/// `GET /api/webhooks/{id}`
pub async fn get_webhook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<WebhookResponse> {
    let webhook = owned_webhook(&state, &user, id).await?;
    Ok(ok(WebhookResponse::from(webhook)))
}

/// `PUT /api/webhooks/{id}`
pub async fn update_webhook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWebhookRequest>,
) -> ApiResult<WebhookResponse> {
    payload
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Validation error: {e}")))?;

    owned_webhook(&state, &user, id).await?;

    if let Some(url) = &payload.url {
        check_url(&state, url)?;
    }

    let updated = state.store().update(id, payload).await.map_err(map_error)?;
    Ok(ok(WebhookResponse::from(updated)))
}

/// `DELETE /api/webhooks/{id}`
pub async fn delete_webhook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    owned_webhook(&state, &user, id).await?;
    state.store().delete(id).await.map_err(map_error)?;
    Ok(ok(serde_json::json!({"deleted": id})))
}

/// `POST /api/webhooks/{id}/test`
///
/// Enqueues a `{test: true, timestamp}` payload on the caller's shard; the
/// delivery itself is observable in the logs like any other attempt.
pub async fn test_webhook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<TestSendResponse> {
    owned_webhook(&state, &user, id).await?;

    let job_id = state
        .router
        .emit_to_one(
            id,
            forgehook_dispatch::TEST_EVENT_TYPE,
            serde_json::json!({"test": true}),
        )
        .await
        .map_err(map_error)?;

    Ok(ok(TestSendResponse { job_id }))
}

/// `POST /api/webhooks/{id}/regenerate-secret`
pub async fn regenerate_secret(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<SecretResponse> {
    owned_webhook(&state, &user, id).await?;

    let secret = state.store().rotate_secret(id).await.map_err(map_error)?;
    Ok(ok(SecretResponse { secret }))
}

/// `GET /api/webhooks/{id}/logs?limit=&offset=&success=`
pub async fn list_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<LogsPage> {
    owned_webhook(&state, &user, id).await?;

    let limit = query.limit.unwrap_or(20).clamp(1, MAX_LOG_PAGE);
    let offset = query.offset.unwrap_or(0).max(0);
    let status_filter = query.success.map(|s| if s { LogStatus::Success } else { LogStatus::Failed });

    let (logs, total) = state
        .store()
        .logs_by_webhook(id, limit, offset, status_filter)
        .await
        .map_err(map_error)?;

    Ok(ok(LogsPage { logs, total, limit, offset }))
}

/// `POST /api/webhooks/logs/{log_id}/retry`
///
/// Replays the logged payload as a fresh job. The original log row is never
/// modified; the replay produces its own rows.
pub async fn retry_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(log_id): Path<Uuid>,
) -> ApiResult<TestSendResponse> {
    let log = state
        .store()
        .log_by_id(log_id)
        .await
        .map_err(map_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Log entry not found"))?;

    // Ownership runs through the log's webhook
    owned_webhook(&state, &user, log.webhook_id).await?;

    let payload: serde_json::Value = serde_json::from_str(&log.payload)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Stored payload unreadable: {e}")))?;

    let job_id = state
        .router
        .emit_to_one(log.webhook_id, &log.event_type, payload)
        .await
        .map_err(map_error)?;

    Ok(ok(TestSendResponse { job_id }))
}
