//! Read-through response cache for idempotent GET routes.
//!
//! Entries expire by TTL only; writes to the underlying records do not
//! purge them, so a cached list can lag behind for up to one TTL.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Query, RawPathParams, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    RequestExt,
};
use metrics::counter;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::metrics::{CACHE_HIT, CACHE_MISS};
use crate::store::SharedStore;

pub const X_CACHE: &str = "x-cache";

/// Largest response body that will be cached; bigger ones are sent uncached
const MAX_CACHED_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct ResponseCache {
    prefix: Arc<str>,
    ttl: Duration,
    store: Arc<dyn SharedStore>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    pub fn new(prefix: &str, ttl: Duration, store: Arc<dyn SharedStore>) -> Self {
        Self {
            prefix: Arc::from(prefix),
            ttl,
            store,
        }
    }

    /// `prefix` + route params as JSON + query params as JSON, both sorted by name
    pub fn key(&self, params: &BTreeMap<String, String>, query: &BTreeMap<String, String>) -> String {
        let params = serde_json::to_string(params).unwrap_or_default();
        let query = serde_json::to_string(query).unwrap_or_default();
        format!("{}{}{}", self.prefix, params, query)
    }

    /// Stored body for `key`. A failing store reads as a miss.
    pub async fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, bypassing cache");
                None
            },
        }
    }

    /// Store a body under `key`. Failures are logged and dropped.
    pub async fn put(&self, key: &str, body: Vec<u8>) {
        if let Err(e) = self.store.set(key, body, self.ttl).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }
}

fn mark(response: &mut Response, value: &'static str) {
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(value));
}

/// Cache middleware: serve a stored body when present, otherwise run the
/// handler and keep its body when it answered 200.
pub async fn cache_response(
    State(cache): State<ResponseCache>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let params: BTreeMap<String, String> = match request.extract_parts::<RawPathParams>().await {
        Ok(raw) => raw
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(_) => BTreeMap::new(),
    };
    let query = Query::<BTreeMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();
    let key = cache.key(&params, &query);

    if let Some(body) = cache.lookup(&key).await {
        counter!(CACHE_HIT).increment(1);
        debug!(key = %key, "cache hit");
        let mut response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
        mark(&mut response, "HIT");
        return Ok(response);
    }

    counter!(CACHE_MISS).increment(1);
    let mut response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return Ok(response);
    }

    let cacheable = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_CACHED_BYTES as u64);
    if !cacheable {
        debug!(key = %key, "response body unbounded or too large to cache");
        mark(&mut response, "MISS");
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_CACHED_BYTES)
        .await
        .map_err(|e| AppError::Internal(format!("failed to buffer response: {e}")))?;
    cache.put(&key, bytes.to_vec()).await;

    let mut response = Response::from_parts(parts, Body::from(bytes));
    mark(&mut response, "MISS");
    Ok(response)
}
