//! Verified identity attached to a request by the authenticate stage.
use axum::{extract::FromRequestParts, http::request::Parts};
use rbac_common::Role;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;

/// Identity loaded fresh from storage, plus the role claimed by the token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    /// Role snapshot embedded in the token. Authorization decisions use this.
    pub role: Role,
}

impl AuthContext {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner-or-admin check used for product mutations
    pub fn may_modify(&self, owner_id: Uuid) -> bool {
        self.user.id == owner_id || self.is_admin()
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))
    }
}
