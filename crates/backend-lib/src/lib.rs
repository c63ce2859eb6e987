// ============================
// backend-lib/src/lib.rs
// ============================
//! Core of the RBAC REST API: request pipeline, handlers and storage.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod router;
pub mod storage;
pub mod store;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use rbac_common::Role;
use tracing::info;

use crate::auth::{CredentialHasher, TokenService};
use crate::config::{AdminSeed, Settings};
use crate::error::AppError;
use crate::middleware::{RateLimiter, ResponseCache};
use crate::models::User;
use crate::storage::Storage;
use crate::store::{MemoryStore, SharedStore};
use crate::validation::sanitize_string;

pub use router::create_router;

/// Rate limiters, one per route group
#[derive(Clone, Debug)]
pub struct Limiters {
    pub auth: RateLimiter,
    pub products: RateLimiter,
    pub users: RateLimiter,
}

/// Response caches for the product read routes
#[derive(Clone, Debug)]
pub struct Caches {
    pub product_list: ResponseCache,
    pub product_detail: ResponseCache,
}

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Storage backend
    pub storage: S,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
    /// Bearer token issuer and verifier
    pub tokens: TokenService,
    /// Password hasher
    pub hasher: CredentialHasher,
    /// Store behind the rate limiters and the response caches
    pub shared_store: Arc<dyn SharedStore>,
    pub limiters: Limiters,
    pub caches: Caches,
}

impl<S: Storage> AppState<S> {
    /// Create a new application state backed by an in-process shared store
    pub fn new(storage: S, settings: Settings) -> Result<Self, AppError> {
        Self::with_shared_store(storage, settings, Arc::new(MemoryStore::new()))
    }

    /// Create a new application state on an existing shared store
    pub fn with_shared_store(
        storage: S,
        settings: Settings,
        shared_store: Arc<dyn SharedStore>,
    ) -> Result<Self, AppError> {
        let hasher = CredentialHasher::new(settings.auth.scrypt_log_n)?;
        let tokens = TokenService::from_settings(&settings);

        let quotas = &settings.rate_limit;
        let limiter = |scope: &str, quota| {
            RateLimiter::from_quota(scope, quota, shared_store.clone())
                .with_sweep_probability(quotas.sweep_probability)
                .with_trusted_proxy_headers(settings.server.trust_proxy_headers)
        };
        let limiters = Limiters {
            auth: limiter("auth", quotas.auth),
            products: limiter("products", quotas.products),
            users: limiter("users", quotas.users),
        };

        let caches = Caches {
            product_list: ResponseCache::new(
                "cache:products:list:",
                Duration::from_secs(settings.cache.product_list_ttl_secs),
                shared_store.clone(),
            ),
            product_detail: ResponseCache::new(
                "cache:products:detail:",
                Duration::from_secs(settings.cache.product_detail_ttl_secs),
                shared_store.clone(),
            ),
        };

        Ok(Self {
            storage,
            settings: Arc::new(settings),
            tokens,
            hasher,
            shared_store,
            limiters,
            caches,
        })
    }

    /// Create the bootstrap admin unless an account with that username exists.
    /// Returns `true` when an account was created.
    pub async fn seed_admin(&self, seed: &AdminSeed) -> Result<bool, AppError> {
        // Stored in the form request bodies reach the handlers in
        let clean = |field: &str| sanitize_string(field.trim());
        let username = clean(&seed.username);
        let email = clean(&seed.email);

        if self.storage.user_by_username(&username).await?.is_some() {
            return Ok(false);
        }
        if self.storage.user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "cannot seed admin '{username}': email already registered"
            )));
        }

        let password_hash = self.hasher.hash_blocking(clean(&seed.password)).await?;
        let admin = User::new(username, email, password_hash, Role::Admin);
        let admin = self.storage.insert_user(admin).await?;
        info!(user_id = %admin.id, username = %admin.username, "bootstrap admin created");
        Ok(true)
    }
}
