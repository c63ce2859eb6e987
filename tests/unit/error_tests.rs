// =========================
// tests/unit/error_tests.rs
// =========================
//! Unit tests for the error module
use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
use backend_lib::error::AppError;
use backend_lib::validation::ValidationError;
use serde_json::Value;

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(AppError::Validation("x".into()).error_code(), "VAL_001");
    assert_eq!(AppError::Conflict("x".into()).error_code(), "VAL_002");
    assert_eq!(AppError::Unauthorized("x".into()).error_code(), "AUTH_001");
    assert_eq!(AppError::AccountDeactivated.error_code(), "AUTH_002");
    assert_eq!(AppError::Forbidden("x".into()).error_code(), "AUTH_003");
    assert_eq!(AppError::NotFound("x".into()).error_code(), "NF_001");
    assert_eq!(AppError::RateLimited.error_code(), "RATE_001");
    assert_eq!(AppError::Timeout.error_code(), "TIME_001");
    assert_eq!(AppError::Internal("x".into()).error_code(), "INT_001");
}

#[test]
fn test_validation_error_converts_to_400() {
    let err: AppError = ValidationError::InvalidPrice.into();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Price must be a positive number");
}

#[test]
fn test_timeout_maps_to_408() {
    assert_eq!(AppError::Timeout.status_code(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn test_internal_error_hides_detail_in_message() {
    let response = AppError::Internal("disk /var/lib/db is full".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Internal server error");
    assert!(body["error"].as_str().unwrap().starts_with("INT_001"));
}
