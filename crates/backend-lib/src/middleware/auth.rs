//! Authentication and authorization stages.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use rbac_common::Role;
use tracing::{debug, warn};

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::metrics::AUTH_REJECTED;
use crate::storage::Storage;
use crate::AppState;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn rejected(message: &str) -> AppError {
    counter!(AUTH_REJECTED).increment(1);
    AppError::Unauthorized(message.to_string())
}

/// Verify the bearer token, reload the identity and make sure it is still
/// active. On success the request carries an [`AuthContext`].
pub async fn authenticate<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = {
        let token =
            bearer_token(request.headers()).ok_or_else(|| rejected("Not authorized, no token"))?;
        state
            .tokens
            .verify(token)
            .map_err(|_| rejected("Not authorized, token invalid or expired"))?
    };

    let user = state
        .storage
        .user_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "token subject no longer exists");
            rejected("User no longer exists")
        })?;

    if !user.is_active {
        warn!(user_id = %user.id, "request with token of deactivated account");
        counter!(AUTH_REJECTED).increment(1);
        return Err(AppError::AccountDeactivated);
    }

    request.extensions_mut().insert(AuthContext {
        user,
        role: claims.role,
    });
    Ok(next.run(request).await)
}

/// Allow only callers whose token role equals `required`
pub async fn authorize(
    State(required): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role = request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.role)
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

    if role != required {
        return Err(AppError::Forbidden(format!(
            "User role '{role}' is not authorized to access this route"
        )));
    }
    Ok(next.run(request).await)
}
