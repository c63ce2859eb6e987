//! Per-route composition of the request stages.
use std::sync::Arc;

use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::MethodRouter};
use rbac_common::Role;

use super::{authenticate, authorize, cache_response, rate_limit, sanitize, validate};
use super::{RateLimiter, ResponseCache};
use crate::storage::Storage;
use crate::validation::RuleSet;
use crate::AppState;

/// Builder for the stages wrapped around one route.
///
/// ```ignore
/// let create = Pipeline::new(&state)
///     .validate(RuleSet::Product)
///     .rate_limit(&state.limiters.products)
///     .authenticated()
///     .apply(post(handlers::products::create_product));
/// ```
///
/// Whatever order the builder methods are called in, the stages always run
/// as sanitize, validate, rate-limit, authenticate, authorize, cache.
pub struct Pipeline<S> {
    state: Arc<AppState<S>>,
    rules: Option<RuleSet>,
    limiter: Option<RateLimiter>,
    authenticate: bool,
    role: Option<Role>,
    cache: Option<ResponseCache>,
}

impl<S: Storage + 'static> Pipeline<S> {
    /// Every pipeline sanitizes; the other stages are opt-in
    pub fn new(state: &Arc<AppState<S>>) -> Self {
        Self {
            state: Arc::clone(state),
            rules: None,
            limiter: None,
            authenticate: false,
            role: None,
            cache: None,
        }
    }

    pub fn validate(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn rate_limit(mut self, limiter: &RateLimiter) -> Self {
        self.limiter = Some(limiter.clone());
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticate = true;
        self
    }

    /// Require `role`. Implies [`Self::authenticated`].
    pub fn authorize(mut self, role: Role) -> Self {
        self.authenticate = true;
        self.role = Some(role);
        self
    }

    pub fn cached(mut self, cache: &ResponseCache) -> Self {
        self.cache = Some(cache.clone());
        self
    }

    /// Wrap `route` with the configured stages.
    ///
    /// `route_layer` makes the last layer added the outermost, so stages are
    /// added innermost first.
    pub fn apply(
        self,
        route: MethodRouter<Arc<AppState<S>>>,
    ) -> MethodRouter<Arc<AppState<S>>> {
        let mut route = route;
        if let Some(cache) = self.cache {
            route = route.route_layer(from_fn_with_state(cache, cache_response));
        }
        if let Some(role) = self.role {
            route = route.route_layer(from_fn_with_state(role, authorize));
        }
        if self.authenticate {
            route = route.route_layer(from_fn_with_state(self.state.clone(), authenticate::<S>));
        }
        if let Some(limiter) = self.limiter {
            route = route.route_layer(from_fn_with_state(limiter, rate_limit));
        }
        if let Some(rules) = self.rules {
            route = route.route_layer(from_fn_with_state(rules, validate));
        }
        route.route_layer(from_fn(sanitize))
    }
}
