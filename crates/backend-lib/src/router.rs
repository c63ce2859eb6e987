// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router: API routes with their pipelines, plus the router-wide layers.
use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use rbac_common::Role;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing::warn;

use crate::handlers::{auth, products, system, users};
use crate::middleware::{handle_panic, log_requests, request_deadline, Pipeline};
use crate::storage::Storage;
use crate::validation::RuleSet;
use crate::AppState;

/// Create the application router
pub fn create_router<S: Storage + 'static>(state: Arc<AppState<S>>) -> Router {
    let prefix = state.settings.server.api_prefix.trim_end_matches('/').to_string();
    let timeout = state.settings.request_timeout();
    let cors = cors_layer(&state.settings.server.cors_origin);

    let api = Router::new()
        .merge(auth_routes(&state))
        .merge(product_routes(&state))
        .merge(user_routes(&state));

    let router = Router::new()
        .route("/", get(system::banner))
        .route("/health", get(system::health));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    router
        .fallback(system::fallback)
        .with_state(state)
        .layer(from_fn_with_state(timeout, request_deadline))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(log_requests))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);
    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin = %origin, error = %e, "invalid CORS origin, cross-origin requests disabled");
            layer
        },
    }
}

fn auth_routes<S: Storage + 'static>(state: &Arc<AppState<S>>) -> Router<Arc<AppState<S>>> {
    let limiter = &state.limiters.auth;
    Router::new()
        .route(
            "/auth/register",
            Pipeline::new(state)
                .validate(RuleSet::Auth)
                .rate_limit(limiter)
                .apply(post(auth::register::<S>)),
        )
        .route(
            "/auth/login",
            Pipeline::new(state)
                .validate(RuleSet::Login)
                .rate_limit(limiter)
                .apply(post(auth::login::<S>)),
        )
        .route(
            "/auth/me",
            Pipeline::new(state)
                .rate_limit(limiter)
                .authenticated()
                .apply(get(auth::me)),
        )
        .route(
            "/auth/updatepassword",
            Pipeline::new(state)
                .validate(RuleSet::Auth)
                .rate_limit(limiter)
                .authenticated()
                .apply(put(auth::update_password::<S>)),
        )
}

fn product_routes<S: Storage + 'static>(state: &Arc<AppState<S>>) -> Router<Arc<AppState<S>>> {
    let limiter = &state.limiters.products;
    let caches = &state.caches;

    let list = Pipeline::new(state)
        .rate_limit(limiter)
        .authenticated()
        .cached(&caches.product_list)
        .apply(get(products::list_products::<S>));
    let create = Pipeline::new(state)
        .validate(RuleSet::Product)
        .rate_limit(limiter)
        .authenticated()
        .apply(post(products::create_product::<S>));
    let mine = Pipeline::new(state)
        .rate_limit(limiter)
        .authenticated()
        .apply(get(products::my_products::<S>));
    let show = Pipeline::new(state)
        .rate_limit(limiter)
        .authenticated()
        .cached(&caches.product_detail)
        .apply(get(products::get_product::<S>));
    let update = Pipeline::new(state)
        .validate(RuleSet::Product)
        .rate_limit(limiter)
        .authenticated()
        .apply(put(products::update_product::<S>));
    let remove = Pipeline::new(state)
        .rate_limit(limiter)
        .authorize(Role::Admin)
        .apply(delete(products::delete_product::<S>));

    Router::new()
        .route("/products", list.merge(create))
        .route("/products/my-products", mine)
        .route("/products/{id}", show.merge(update).merge(remove))
}

fn user_routes<S: Storage + 'static>(state: &Arc<AppState<S>>) -> Router<Arc<AppState<S>>> {
    let limiter = &state.limiters.users;
    let admin = || Pipeline::new(state).rate_limit(limiter).authorize(Role::Admin);

    Router::new()
        .route("/users", admin().apply(get(users::list_users::<S>)))
        .route(
            "/users/{id}",
            admin()
                .apply(get(users::get_user::<S>))
                .merge(admin().validate(RuleSet::Auth).apply(put(users::update_user::<S>)))
                .merge(admin().apply(delete(users::delete_user::<S>))),
        )
}
