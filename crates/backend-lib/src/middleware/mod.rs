// crates/backend-lib/src/middleware/mod.rs

//! Request pipeline stages.
//!
//! Per-route stages run in a fixed order, outermost first:
//! sanitize, validate, rate-limit, authenticate, authorize, cache, handler.
//! [`Pipeline`] attaches the stages a route needs; the logging, panic and
//! deadline layers wrap the whole router.

pub mod auth;
pub mod cache;
pub mod logging;
pub mod pipeline;
pub mod rate_limit;
pub mod sanitize;

pub use auth::{authenticate, authorize, bearer_token};
pub use cache::{cache_response, ResponseCache};
pub use logging::{handle_panic, log_requests, request_deadline};
pub use pipeline::Pipeline;
pub use rate_limit::{client_key, rate_limit, request_client_key, RateLimiter};
pub use sanitize::{sanitize, validate, SanitizedPayload};
