//! Body sanitizing and rule-set validation stages.
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::error::AppError;
use crate::validation::{sanitize_value, RuleSet};

/// Largest body either stage will buffer
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The JSON body after sanitizing, shared with later stages
#[derive(Debug, Clone)]
pub struct SanitizedPayload(pub Value);

/// Buffer the body and try to read it as JSON. The request comes back with
/// the same bytes so the handler can still extract it.
async fn buffer_json(request: Request) -> Result<(Request, Option<Value>), AppError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::Validation("Request body is too large".to_string()))?;
    let value = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&bytes).ok()
    };
    Ok((Request::from_parts(parts, Body::from(bytes)), value))
}

/// Trim and escape every string in a JSON object body.
///
/// Bodies that are empty or not JSON pass through untouched; the handler's
/// extractor reports those.
pub async fn sanitize(request: Request, next: Next) -> Result<Response, AppError> {
    let (request, value) = buffer_json(request).await?;
    let Some(value) = value else {
        return Ok(next.run(request).await);
    };

    let clean = sanitize_value(value);
    let body = serde_json::to_vec(&clean)?;

    let (mut parts, _) = request.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts.extensions.insert(SanitizedPayload(clean));
    Ok(next.run(Request::from_parts(parts, Body::from(body))).await)
}

/// Check the body against `rules`, failing with 400 on the first violation
pub async fn validate(
    State(rules): State<RuleSet>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let checked = match request.extensions().get::<SanitizedPayload>() {
        Some(SanitizedPayload(value)) => {
            rules.check_value(value)?;
            true
        },
        None => false,
    };
    if checked {
        return Ok(next.run(request).await);
    }

    let (request, value) = buffer_json(request).await?;
    if let Some(value) = value {
        rules.check_value(&value)?;
    }
    Ok(next.run(request).await)
}
