pub mod events;
pub mod webhooks;

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use forgehook_common::Error;

/// Success envelope: `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

/// Error envelope: `{"success": false, "error": ...}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, data })
}

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse { success: false, error: message.into() }),
    )
}

/// Map engine errors onto the admin response contract.
pub fn map_error(err: Error) -> ApiError {
    match err {
        Error::Validation(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        Error::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        Error::Forbidden(msg) => api_error(StatusCode::FORBIDDEN, msg),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}
