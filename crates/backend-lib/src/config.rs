// ============================
// backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "RBAC_";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    /// Account created at startup when no identity with that username exists
    pub admin: Option<AdminSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Versioned base path every API route is nested under
    pub api_prefix: String,
    /// Origin allowed by CORS
    pub cors_origin: String,
    /// Deadline for a single request
    pub request_timeout_secs: u64,
    /// Key rate limits by `X-Forwarded-For` / `X-Real-IP` (set only behind a
    /// proxy that overwrites them)
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret used to sign bearer tokens
    pub jwt_secret: String,
    /// TTL of tokens issued at login and registration
    pub session_ttl_secs: u64,
    /// TTL of tokens re-issued after a password change
    pub reissue_ttl_secs: u64,
    /// scrypt cost parameter (log2 of N)
    pub scrypt_log_n: u8,
}

/// Request quota for one route group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Quota {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window_ms: 60_000,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub auth: Quota,
    pub products: Quota,
    pub users: Quota,
    /// Probability that a request triggers a sweep of stale client windows
    pub sweep_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub product_list_ttl_secs: u64,
    pub product_detail_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    FlatFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Data directory path (flat-file backend only)
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level used when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            api_prefix: "/api/v1".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            trust_proxy_headers: false,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 7, // 7 days
            reissue_ttl_secs: 60 * 60 * 24,     // 24 hours
            scrypt_log_n: 15,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            auth: Quota::per_minute(20),
            products: Quota::per_minute(50),
            users: Quota::per_minute(30),
            sweep_probability: 0.01,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            product_list_ttl_secs: 60,
            product_detail_ttl_secs: 60,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` in the working directory and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from a specific TOML file, then the environment.
    /// A missing file is not an error; defaults fill the gaps.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            bail!("unknown log level '{}'", self.logging.level);
        }
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.session_ttl_secs == 0 || self.auth.reissue_ttl_secs == 0 {
            bail!("token TTLs must be greater than zero");
        }
        if !(1..=20).contains(&self.auth.scrypt_log_n) {
            bail!("auth.scrypt_log_n must be between 1 and 20");
        }
        for (name, quota) in [
            ("auth", self.rate_limit.auth),
            ("products", self.rate_limit.products),
            ("users", self.rate_limit.users),
        ] {
            if quota.max_requests == 0 || quota.window_ms == 0 {
                bail!("rate_limit.{name} must allow at least one request per non-empty window");
            }
        }
        if !(0.0..=1.0).contains(&self.rate_limit.sweep_probability) {
            bail!("rate_limit.sweep_probability must be within 0.0..=1.0");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than zero");
        }
        if !self.server.api_prefix.starts_with('/') {
            bail!("server.api_prefix must start with '/'");
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.session_ttl_secs)
    }

    pub fn reissue_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.reissue_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
