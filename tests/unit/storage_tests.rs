//! Flat-file storage behind the full router
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use backend_lib::{
    config::AdminSeed,
    create_router,
    storage::{FlatFileStorage, Storage},
    AppState,
};
use crate::test_utils::{test_settings, TestApp};
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

#[tokio::test]
async fn test_registered_user_survives_restart() {
    let temp_dir = tempdir().unwrap();

    {
        let storage = FlatFileStorage::new(temp_dir.path()).unwrap();
        let state = Arc::new(AppState::new(storage, test_settings()).unwrap());
        let router = create_router(state);
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"username":"persist","email":"persist@x.com","password":"secret1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let reopened = FlatFileStorage::new(temp_dir.path()).unwrap();
    let user = reopened.user_by_username("persist").await.unwrap().unwrap();
    assert_eq!(user.email, "persist@x.com");
    assert!(user.password_hash.starts_with("$scrypt$"));
}

#[tokio::test]
async fn test_seed_admin_is_idempotent() {
    let temp_dir = tempdir().unwrap();
    let storage = FlatFileStorage::new(temp_dir.path()).unwrap();
    let state = AppState::new(storage, test_settings()).unwrap();

    let seed = AdminSeed {
        username: "root_admin".to_string(),
        email: "root@x.com".to_string(),
        password: "hunter22".to_string(),
    };
    assert!(state.seed_admin(&seed).await.unwrap());
    assert!(!state.seed_admin(&seed).await.unwrap());

    let admin = state
        .storage
        .user_by_username("root_admin")
        .await
        .unwrap()
        .unwrap();
    assert!(admin.is_admin());
    assert!(state.hasher.verify("hunter22", &admin.password_hash));
}

#[tokio::test]
async fn test_seeded_admin_logs_in_with_markup_in_password() {
    let app = TestApp::new();
    let seed = AdminSeed {
        username: "root_admin".to_string(),
        email: "root@x.com".to_string(),
        password: "S3cret/&pass".to_string(),
    };
    assert!(app.state.seed_admin(&seed).await.unwrap());

    let login = app
        .post(
            "/api/v1/auth/login",
            None,
            serde_json::json!({ "username": "root_admin", "password": "S3cret/&pass" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["data"]["role"], "admin");
}
