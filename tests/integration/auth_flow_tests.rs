//! Registration, login and self-service account flows
use axum::http::{Method, StatusCode};
use backend_lib::storage::Storage;
use crate::test_utils::TestApp;
use serde_json::json;

const REGISTER: &str = "/api/v1/auth/register";
const LOGIN: &str = "/api/v1/auth/login";

#[tokio::test]
async fn test_end_to_end_alice() {
    let app = TestApp::new();

    let registered = app
        .post(
            REGISTER,
            None,
            json!({ "username": "alice", "email": "alice@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.message(), "User registered successfully");
    assert!(!registered.token().is_empty());
    let alice_id = registered.body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(registered.body["data"]["role"], "user");

    let wrong = app
        .post(LOGIN, None, json!({ "username": "alice", "password": "wrong" }))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.message(), "Invalid credentials");

    let login = app
        .post(LOGIN, None, json!({ "username": "alice", "password": "secret1" }))
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.message(), "Login successful");
    assert_eq!(login.body["data"]["role"], "user");
    let token = login.token();

    let created = app
        .post(
            "/api/v1/products",
            Some(&token),
            json!({ "name": "Widget", "price": 9.99, "stock": 5 }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["ownerId"], alice_id.as_str());
    let product_id = created.body["data"]["id"].as_str().unwrap().to_string();
    let product_uri = format!("/api/v1/products/{product_id}");

    let denied = app.delete(&product_uri, &token).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let (_, admin_token) = app.admin("root").await;
    let deleted = app.delete(&product_uri, &admin_token).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.message(), "Product deleted successfully");
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = TestApp::new();
    app.register("bob", "secret1").await;

    let same_email = app
        .post(
            REGISTER,
            None,
            json!({ "username": "bobby", "email": "bob@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(same_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(same_email.message(), "Email already registered");

    let same_name = app
        .post(
            REGISTER,
            None,
            json!({ "username": "bob", "email": "other@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(same_name.status, StatusCode::BAD_REQUEST);
    assert_eq!(same_name.message(), "Username already taken");

    assert_eq!(app.state.storage.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_registration_ignores_requested_role() {
    let app = TestApp::new();
    let response = app
        .post(
            REGISTER,
            None,
            json!({
                "username": "mallory",
                "email": "mallory@x.com",
                "password": "secret1",
                "role": "admin"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["data"]["role"], "user");
}

#[tokio::test]
async fn test_registration_requires_all_fields() {
    let app = TestApp::new();
    let response = app
        .post(REGISTER, None, json!({ "username": "carl", "password": "secret1" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.message(),
        "Please provide username, email and password"
    );
}

#[tokio::test]
async fn test_registration_validates_fields() {
    let app = TestApp::new();
    let response = app
        .post(
            REGISTER,
            None,
            json!({ "username": "ab", "email": "ab@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.message(),
        "Username must be between 3 and 50 characters"
    );

    let response = app
        .post(
            REGISTER,
            None,
            json!({ "username": "abc", "email": "not-an-email", "password": "secret1" }),
        )
        .await;
    assert_eq!(response.message(), "Please provide a valid email address");

    let response = app
        .post(
            REGISTER,
            None,
            json!({ "username": "abc", "email": "abc@x.com", "password": "12345" }),
        )
        .await;
    assert_eq!(
        response.message(),
        "Password must be at least 6 characters long"
    );
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_the_same() {
    let app = TestApp::new();
    app.register("frank", "secret1").await;

    let unknown = app
        .post(LOGIN, None, json!({ "username": "nobody", "password": "secret1" }))
        .await;
    let wrong = app
        .post(LOGIN, None, json!({ "username": "frank", "password": "secret2" }))
        .await;

    assert_eq!(unknown.status, wrong.status);
    assert_eq!(unknown.body, wrong.body);
}

#[tokio::test]
async fn test_deactivated_account_cannot_log_in() {
    let app = TestApp::new();
    let (_, id) = app.register("gina", "secret1").await;
    let (_, admin_token) = app.admin("root").await;

    let updated = app
        .put(
            &format!("/api/v1/users/{id}"),
            &admin_token,
            json!({ "isActive": false }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);

    let login = app
        .post(LOGIN, None, json!({ "username": "gina", "password": "secret1" }))
        .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.message(), "Account is deactivated");
}

#[tokio::test]
async fn test_me_returns_profile_without_secret() {
    let app = TestApp::new();
    let (token, id) = app.register("hank", "secret1").await;

    let me = app.get("/api/v1/auth/me", &token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["id"], id.as_str());
    assert_eq!(me.body["data"]["username"], "hank");
    assert_eq!(me.body["data"]["isActive"], true);
    assert!(me.body["data"].get("passwordHash").is_none());
    assert!(me.body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::new();
    let response = app.call(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Not authorized, no token");
}

#[tokio::test]
async fn test_update_password_flow() {
    let app = TestApp::new();
    let (token, _) = app.register("ivy", "secret1").await;
    let uri = "/api/v1/auth/updatepassword";

    let wrong = app
        .put(
            uri,
            &token,
            json!({ "currentPassword": "nope", "newPassword": "secret2" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.message(), "Current password is incorrect");

    let short = app
        .put(
            uri,
            &token,
            json!({ "currentPassword": "secret1", "newPassword": "123" }),
        )
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let missing = app.put(uri, &token, json!({ "currentPassword": "secret1" })).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        missing.message(),
        "Current password and new password are required"
    );

    let changed = app
        .put(
            uri,
            &token,
            json!({ "currentPassword": "secret1", "newPassword": "secret2" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    let reissued = changed.token();

    let claims = app.state.tokens.verify(&reissued).unwrap();
    assert_eq!(claims.exp - claims.iat, 24 * 3600);

    let old = app
        .post(LOGIN, None, json!({ "username": "ivy", "password": "secret1" }))
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .post(LOGIN, None, json!({ "username": "ivy", "password": "secret2" }))
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn test_markup_in_fields_is_escaped_before_storage() {
    let app = TestApp::new();
    let (token, _) = app.register("jack", "secret1").await;

    let created = app
        .post(
            "/api/v1/products",
            Some(&token),
            json!({ "name": "<script>x</script>", "price": 1 }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(
        created.body["data"]["name"],
        "&lt;script&gt;x&lt;&#x2F;script&gt;"
    );
}

#[tokio::test]
async fn test_system_routes() {
    let app = TestApp::new();

    let banner = app.call(Method::GET, "/", None, None).await;
    assert_eq!(banner.status, StatusCode::OK);
    assert_eq!(banner.message(), "RBAC REST API Server");

    let health = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.message(), "Server is running");

    let missing = app.call(Method::GET, "/api/v1/nothing", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["success"], false);
    assert_eq!(missing.message(), "Route not found");
}
