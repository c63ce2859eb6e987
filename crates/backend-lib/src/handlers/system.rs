//! Service banner, health check and JSON fallback.
use axum::{http::StatusCode, Json};
use rbac_common::ApiResponse;
use serde::Serialize;

use super::{reply, ApiResult};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// `GET /`
pub async fn banner() -> ApiResult<ServiceInfo> {
    reply(
        StatusCode::OK,
        ApiResponse::ok("RBAC REST API Server").with_data(ServiceInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// `GET /health`
pub async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::ok("Server is running"))
}

/// Any unmatched route
pub async fn fallback() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
