//! Account administration. Every route here is admin-only.
use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use rbac_common::{ApiResponse, UpdateUserRequest, UserProfile};
use tracing::{info, warn};
use uuid::Uuid;

use super::{reply, required, ApiResult};
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::storage::Storage;
use crate::AppState;

fn not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// `GET /users`
pub async fn list_users<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Vec<UserProfile>> {
    let users = state.storage.list_users().await?;
    let profiles = users.iter().map(|u| u.profile()).collect();
    reply(
        StatusCode::OK,
        ApiResponse::ok("Users retrieved successfully").with_data(profiles),
    )
}

/// `GET /users/{id}`
pub async fn get_user<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<UserProfile> {
    let user = state.storage.user_by_id(id).await?.ok_or_else(not_found)?;
    reply(
        StatusCode::OK,
        ApiResponse::ok("User retrieved successfully").with_data(user.profile()),
    )
}

/// `PUT /users/{id}`
///
/// A new username or email must not belong to another account.
pub async fn update_user<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult<UserProfile> {
    let mut user = state.storage.user_by_id(id).await?.ok_or_else(not_found)?;

    if let Some(username) = required(body.username) {
        if username != user.username {
            if let Some(other) = state.storage.user_by_username(&username).await? {
                if other.id != user.id {
                    return Err(AppError::Conflict("Username already taken".to_string()));
                }
            }
        }
        user.username = username;
    }

    if let Some(email) = required(body.email) {
        if email != user.email {
            if let Some(other) = state.storage.user_by_email(&email).await? {
                if other.id != user.id {
                    return Err(AppError::Conflict("Email already registered".to_string()));
                }
            }
        }
        user.email = email;
    }

    if let Some(role) = body.role {
        if role != user.role {
            info!(user_id = %user.id, from = %user.role, to = %role, admin_id = %ctx.id(), "role changed");
        }
        user.role = role;
    }
    if let Some(is_active) = body.is_active {
        user.is_active = is_active;
    }
    user.updated_at = Utc::now();

    let user = state.storage.update_user(user).await?;
    info!(user_id = %user.id, username = %user.username, admin_id = %ctx.id(), "user updated");
    reply(
        StatusCode::OK,
        ApiResponse::ok("User updated successfully").with_data(user.profile()),
    )
}

/// `DELETE /users/{id}`: removes the account and the products it owns.
/// Admins cannot delete themselves.
pub async fn delete_user<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    if id == ctx.id() {
        warn!(admin_id = %ctx.id(), "admin attempted to delete own account");
        return Err(AppError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    if !state.storage.delete_user(id).await? {
        return Err(not_found());
    }
    info!(user_id = %id, admin_id = %ctx.id(), "user deleted");
    reply(StatusCode::OK, ApiResponse::ok("User deleted successfully"))
}
