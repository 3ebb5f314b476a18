/*!
 * Caller identity
 *
 * Authentication itself lives in the platform gateway, which terminates the
 * session and forwards the caller's user id in `X-User-Id`. This extractor
 * only reads that header; a request without it never made it through the
 * gateway and is rejected.
 */

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Header carrying the gateway-authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the authenticated caller.
pub struct AuthUser {
    pub user_id: String,
}

#[derive(Debug)]
pub enum AuthError {
    MissingIdentity,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingIdentity => (StatusCode::UNAUTHORIZED, "Missing caller identity"),
        };

        (status, Json(json!({"success": false, "error": message}))).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingIdentity)?;

        Ok(AuthUser { user_id: user_id.to_string() })
    }
}
