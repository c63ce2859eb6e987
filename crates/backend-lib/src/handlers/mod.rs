// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers. Each one runs after its route's pipeline stages, so
//! bodies arrive sanitized and validated and protected routes can rely on an
//! [`AuthContext`](crate::auth::AuthContext).

pub mod auth;
pub mod products;
pub mod system;
pub mod users;

use axum::{http::StatusCode, Json};
use rbac_common::ApiResponse;

use crate::auth::TokenKind;
use crate::error::AppError;
use crate::models::User;
use crate::storage::Storage;
use crate::AppState;

/// Status plus envelope, or an error rendered as an envelope
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub(crate) fn reply<T>(status: StatusCode, body: ApiResponse<T>) -> ApiResult<T> {
    Ok((status, Json(body)))
}

/// A required string field: absent and empty both count as missing
pub(crate) fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

pub(crate) fn issue_token<S: Storage>(
    state: &AppState<S>,
    user: &User,
    kind: TokenKind,
) -> Result<String, AppError> {
    state
        .tokens
        .issue(user.id, user.role, kind)
        .map_err(|e| AppError::Internal(e.to_string()))
}
