// ==========================
// tests/unit/config_tests.rs
// ==========================
//! Unit tests for the configuration module
use backend_lib::config::{Settings, StorageBackend};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    assert_eq!(settings.server.bind_addr.to_string(), "127.0.0.1:5000");
    assert_eq!(settings.server.api_prefix, "/api/v1");
    assert_eq!(settings.server.cors_origin, "http://localhost:3000");
    assert_eq!(settings.storage.backend, StorageBackend::Memory);
    assert_eq!(settings.cache.product_list_ttl_secs, 60);
    assert_eq!(settings.rate_limit.sweep_probability, 0.01);
    assert!(!settings.logging.json);
}

// The only test in this binary that touches RBAC_* variables
#[test]
fn test_environment_overrides_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
        [auth]
        jwt_secret = "from-file"

        [rate_limit.users]
        max_requests = 7
        window_ms = 60000
        "#,
    )
    .unwrap();

    std::env::set_var("RBAC_AUTH__JWT_SECRET", "from-env");
    std::env::set_var("RBAC_LOGGING__JSON", "true");
    let loaded = Settings::load_from(&config_path);
    std::env::remove_var("RBAC_AUTH__JWT_SECRET");
    std::env::remove_var("RBAC_LOGGING__JSON");

    let settings = loaded.unwrap();
    assert_eq!(settings.auth.jwt_secret, "from-env");
    assert!(settings.logging.json);
    assert_eq!(settings.rate_limit.users.max_requests, 7);
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
        [server]
        request_timeout_secs = 0
        "#,
    )
    .unwrap();

    assert!(Settings::load_from(&config_path).is_err());
}
