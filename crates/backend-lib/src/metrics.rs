// ============================
// backend-lib/src/metrics.rs
// ============================
//! Central place for metric keys.
//!
//! No exporter is installed by default; the `metrics` facade drops
//! increments until a recorder is registered by the embedding binary.
pub const HTTP_REQUESTS: &str = "http.requests";
pub const RATE_LIMIT_REJECTED: &str = "rate_limit.rejected";
pub const CACHE_HIT: &str = "cache.hit";
pub const CACHE_MISS: &str = "cache.miss";
pub const AUTH_REGISTER: &str = "auth.register";
pub const AUTH_LOGIN_SUCCESS: &str = "auth.login.success";
pub const AUTH_LOGIN_FAILURE: &str = "auth.login.failure";
pub const AUTH_REJECTED: &str = "auth.rejected";
