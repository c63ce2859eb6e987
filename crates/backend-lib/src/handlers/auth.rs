//! Registration, login and self-service account handlers.
use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use metrics::counter;
use rbac_common::{
    ApiResponse, LoginRequest, RegisterRequest, Role, UpdatePasswordRequest, UserProfile,
};
use tracing::{info, warn};

use super::{issue_token, reply, required, ApiResult};
use crate::auth::{AuthContext, TokenKind};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::metrics::{AUTH_LOGIN_FAILURE, AUTH_LOGIN_SUCCESS, AUTH_REGISTER};
use crate::models::User;
use crate::storage::Storage;
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// `POST /auth/register`
///
/// New accounts always get the `user` role.
pub async fn register<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<UserProfile> {
    let (Some(username), Some(email), Some(password)) = (
        required(body.username),
        required(body.email),
        required(body.password),
    ) else {
        return Err(AppError::Validation(
            "Please provide username, email and password".to_string(),
        ));
    };

    // Two separate lookups; a concurrent registration can slip between them
    if state.storage.user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    if state.storage.user_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = state.hasher.hash_blocking(password).await?;
    let user = state
        .storage
        .insert_user(User::new(username, email, password_hash, Role::User))
        .await?;
    let token = issue_token(&state, &user, TokenKind::Session)?;

    counter!(AUTH_REGISTER).increment(1);
    info!(user_id = %user.id, username = %user.username, "user registered");

    reply(
        StatusCode::CREATED,
        ApiResponse::ok("User registered successfully")
            .with_token(token)
            .with_data(user.profile()),
    )
}

/// `POST /auth/login`
pub async fn login<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<UserProfile> {
    let (Some(username), Some(password)) = (required(body.username), required(body.password))
    else {
        return Err(AppError::Validation(
            "Please provide username and password".to_string(),
        ));
    };

    let Some(user) = state.storage.user_by_username(&username).await? else {
        state.hasher.verify_unknown_user_blocking(password).await?;
        counter!(AUTH_LOGIN_FAILURE).increment(1);
        warn!(username = %username, "login for unknown user");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !user.is_active {
        counter!(AUTH_LOGIN_FAILURE).increment(1);
        warn!(user_id = %user.id, "login for deactivated account");
        return Err(AppError::AccountDeactivated);
    }

    let matches = state
        .hasher
        .verify_blocking(password, user.password_hash.clone())
        .await?;
    if !matches {
        counter!(AUTH_LOGIN_FAILURE).increment(1);
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let token = issue_token(&state, &user, TokenKind::Session)?;
    counter!(AUTH_LOGIN_SUCCESS).increment(1);
    info!(user_id = %user.id, username = %user.username, "user logged in");

    reply(
        StatusCode::OK,
        ApiResponse::ok("Login successful")
            .with_token(token)
            .with_data(user.profile()),
    )
}

/// `GET /auth/me`
pub async fn me(ctx: AuthContext) -> ApiResult<UserProfile> {
    reply(
        StatusCode::OK,
        ApiResponse::ok("User retrieved successfully").with_data(ctx.user.profile()),
    )
}

/// `PUT /auth/updatepassword`
///
/// Answers with a freshly issued token.
pub async fn update_password<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<()> {
    let (Some(current), Some(new_password)) = (
        required(body.current_password),
        required(body.new_password),
    ) else {
        return Err(AppError::Validation(
            "Current password and new password are required".to_string(),
        ));
    };

    let mut user = ctx.user;
    let matches = state
        .hasher
        .verify_blocking(current, user.password_hash.clone())
        .await?;
    if !matches {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    user.password_hash = state.hasher.hash_blocking(new_password).await?;
    user.updated_at = Utc::now();
    let user = state.storage.update_user(user).await?;
    let token = issue_token(&state, &user, TokenKind::Reissue)?;

    info!(user_id = %user.id, "password updated");
    reply(
        StatusCode::OK,
        ApiResponse::ok("Password updated successfully").with_token(token),
    )
}
