//! Per-client sliding-window rate limiting.
//!
//! Each client's recent request timestamps live in the shared store under
//! `ratelimit:{scope}:{client}`. The read-filter-append sequence is not
//! atomic, so concurrent requests from one client may slightly overcount.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use metrics::counter;
use tracing::{debug, warn};

use crate::config::Quota;
use crate::error::AppError;
use crate::metrics::RATE_LIMIT_REJECTED;
use crate::store::SharedStore;

/// Guard for one route group
#[derive(Clone)]
pub struct RateLimiter {
    scope: Arc<str>,
    max_requests: u32,
    window: Duration,
    store: Arc<dyn SharedStore>,
    sweep_probability: f64,
    trust_proxy_headers: bool,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("scope", &self.scope)
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(
        scope: &str,
        max_requests: u32,
        window: Duration,
        store: Arc<dyn SharedStore>,
    ) -> Self {
        Self {
            scope: Arc::from(scope),
            max_requests,
            window,
            store,
            sweep_probability: 0.0,
            trust_proxy_headers: false,
        }
    }

    pub fn from_quota(scope: &str, quota: Quota, store: Arc<dyn SharedStore>) -> Self {
        Self::new(scope, quota.max_requests, quota.window(), store)
    }

    /// Chance that a request also sweeps every expired window from the store
    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub fn with_trusted_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn key(&self, client: &str) -> String {
        format!("ratelimit:{}:{}", self.scope, client)
    }

    async fn maybe_sweep(&self) {
        if self.sweep_probability <= 0.0 || rand::random::<f64>() >= self.sweep_probability {
            return;
        }
        match self.store.sweep_expired().await {
            Ok(removed) => debug!(scope = %self.scope, removed, "swept stale rate-limit windows"),
            Err(e) => warn!(scope = %self.scope, error = %e, "rate-limit sweep failed"),
        }
    }

    /// Admit or reject one request from `client`.
    ///
    /// Store failures admit the request.
    pub async fn check(&self, client: &str) -> Result<(), AppError> {
        self.maybe_sweep().await;

        let key = self.key(client);
        let now = Utc::now().timestamp_millis();
        let window_ms = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);

        let mut stamps: Vec<i64> = match self.store.get(&key).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "discarding unreadable rate-limit window");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "rate-limit store unavailable, admitting request");
                return Ok(());
            },
        };

        stamps.retain(|&stamp| now.saturating_sub(stamp) < window_ms);

        if stamps.len() >= self.max_requests as usize {
            counter!(RATE_LIMIT_REJECTED).increment(1);
            warn!(scope = %self.scope, client = %client, "rate limit exceeded");
            return Err(AppError::RateLimited);
        }

        stamps.push(now);
        let encoded = serde_json::to_vec(&stamps)?;
        if let Err(e) = self.store.set(&key, encoded, self.window).await {
            warn!(key = %key, error = %e, "failed to record request in rate-limit window");
        }
        Ok(())
    }
}

/// Identify the caller by socket peer. With `trust_proxy_headers` the first
/// `X-Forwarded-For` hop, then `X-Real-IP`, take precedence.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    let forwarded = || {
        let first_hop = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        first_hop.or(real_ip).map(str::to_string)
    };

    trust_proxy_headers
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Client key for a request, reading the peer from `ConnectInfo` when present
pub fn request_client_key(request: &Request, trust_proxy_headers: bool) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_key(request.headers(), peer, trust_proxy_headers)
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request_client_key(&request, limiter.trust_proxy_headers);
    limiter.check(&client).await?;
    Ok(next.run(request).await)
}
