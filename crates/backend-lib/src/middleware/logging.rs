//! Router-wide layers: request logging, request deadline and panic recovery.
use std::any::Any;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::metrics::HTTP_REQUESTS;
use crate::middleware::rate_limit::request_client_key;

/// Log method, path, socket peer, status and latency of every request.
/// 5xx responses are logged at WARN.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request_client_key(&request, false);
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;
    counter!(HTTP_REQUESTS).increment(1);

    if response.status().is_server_error() {
        warn!(%method, %path, %client, status, latency_ms, "request failed");
    } else {
        info!(%method, %path, %client, status, latency_ms, "request completed");
    }
    response
}

/// Fail with 408 when the inner service does not answer within `timeout`
pub async fn request_deadline(
    State(timeout): State<Duration>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    tokio::time::timeout(timeout, next.run(request))
        .await
        .map_err(|_| AppError::Timeout)
}

/// Response for a handler panic. The payload is logged, never returned.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "handler panicked");
    AppError::Internal("handler panicked".to_string()).into_response()
}
