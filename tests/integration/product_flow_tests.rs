//! Product CRUD through the full pipeline
use axum::http::{Method, StatusCode};
use crate::test_utils::TestApp;
use serde_json::json;

const PRODUCTS: &str = "/api/v1/products";

async fn create(app: &TestApp, token: &str, body: serde_json::Value) -> String {
    let response = app.post(PRODUCTS, Some(token), body).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_products_require_authentication() {
    let app = TestApp::new();
    let response = app.call(Method::GET, PRODUCTS, None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get(PRODUCTS, "not-a-token").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Not authorized, token invalid or expired");
}

#[tokio::test]
async fn test_create_defaults_and_required_fields() {
    let app = TestApp::new();
    let (token, id) = app.register("kate", "secret1").await;

    let created = app
        .post(PRODUCTS, Some(&token), json!({ "name": "Lamp", "price": 12.5 }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.message(), "Product created successfully");
    assert_eq!(created.body["data"]["stock"], 0);
    assert_eq!(created.body["data"]["ownerId"], id.as_str());
    assert!(created.body["data"]["description"].is_null());

    let missing_price = app.post(PRODUCTS, Some(&token), json!({ "name": "Lamp" })).await;
    assert_eq!(missing_price.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_price.message(), "Please provide product name and price");

    let negative = app
        .post(PRODUCTS, Some(&token), json!({ "name": "Lamp", "price": -1 }))
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
    assert_eq!(negative.message(), "Price must be a positive number");

    let fractional_stock = app
        .post(
            PRODUCTS,
            Some(&token),
            json!({ "name": "Lamp", "price": 1, "stock": 2.5 }),
        )
        .await;
    assert_eq!(fractional_stock.message(), "Stock must be a non-negative integer");
}

#[tokio::test]
async fn test_list_paginates_newest_first_with_creator() {
    let app = TestApp::new();
    let (token, id) = app.register("leo", "secret1").await;

    for i in 0..3 {
        create(
            &app,
            &token,
            json!({ "name": format!("Item {i}"), "price": 1, "category": "tools" }),
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    create(&app, &token, json!({ "name": "Apple", "price": 1, "category": "food" })).await;

    let page = app.get("/api/v1/products?page=1&limit=2&category=tools", &token).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.message(), "Products retrieved successfully");
    assert_eq!(
        page.body["pagination"],
        json!({ "total": 3, "page": 1, "limit": 2, "pages": 2 })
    );
    let items = page.body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "Item 2");
    assert_eq!(items[1]["name"], "Item 1");
    assert_eq!(items[0]["creator"]["id"], id.as_str());
    assert_eq!(items[0]["creator"]["username"], "leo");

    let second = app.get("/api/v1/products?page=2&limit=2&category=tools", &token).await;
    let items = second.body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Item 0");
}

#[tokio::test]
async fn test_list_limit_is_clamped() {
    let app = TestApp::new();
    let (token, _) = app.register("limit", "secret1").await;

    let response = app.get("/api/v1/products?limit=1000", &token).await;
    assert_eq!(response.body["pagination"]["limit"], 100);

    let response = app.get("/api/v1/products?limit=0&page=0", &token).await;
    assert_eq!(response.body["pagination"]["limit"], 1);
    assert_eq!(response.body["pagination"]["page"], 1);

    let response = app.get("/api/v1/products?page=abc", &token).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_my_products_only_lists_own() {
    let app = TestApp::new();
    let (mia, _) = app.register("mia", "secret1").await;
    let (ned, _) = app.register("ned", "secret1").await;

    create(&app, &mia, json!({ "name": "Mine", "price": 1 })).await;
    create(&app, &ned, json!({ "name": "Theirs", "price": 1 })).await;

    let mine = app.get("/api/v1/products/my-products", &mia).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.message(), "Your products retrieved successfully");
    let items = mine.body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Mine");
}

#[tokio::test]
async fn test_get_missing_and_malformed_ids() {
    let app = TestApp::new();
    let (token, _) = app.register("otto", "secret1").await;

    let missing = app
        .get(&format!("{PRODUCTS}/{}", uuid::Uuid::new_v4()), &token)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.message(), "Product not found");

    let malformed = app.get(&format!("{PRODUCTS}/123"), &token).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.message(), "Invalid resource identifier");
}

#[tokio::test]
async fn test_owner_can_partially_update() {
    let app = TestApp::new();
    let (token, _) = app.register("pia", "secret1").await;
    let id = create(
        &app,
        &token,
        json!({ "name": "Chair", "price": 20, "stock": 4, "description": "oak", "category": "home" }),
    )
    .await;
    let uri = format!("{PRODUCTS}/{id}");

    let updated = app
        .put(&uri, &token, json!({ "stock": 9, "description": null }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.message(), "Product updated successfully");
    let data = &updated.body["data"];
    assert_eq!(data["name"], "Chair");
    assert_eq!(data["price"], 20.0);
    assert_eq!(data["stock"], 9);
    assert!(data["description"].is_null());
    assert_eq!(data["category"], "home");

    let invalid = app.put(&uri, &token, json!({ "name": "C" })).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_owner_cannot_update_but_admin_can() {
    let app = TestApp::new();
    let (owner, _) = app.register("quinn", "secret1").await;
    let (other, _) = app.register("rita", "secret1").await;
    let (_, admin) = app.admin("root").await;
    let id = create(&app, &owner, json!({ "name": "Desk", "price": 50 })).await;
    let uri = format!("{PRODUCTS}/{id}");

    let denied = app.put(&uri, &other, json!({ "price": 1 })).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.message(), "Not authorized to update this product");

    let allowed = app.put(&uri, &admin, json!({ "price": 45 })).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.body["data"]["price"], 45.0);
}

#[tokio::test]
async fn test_delete_is_admin_only() {
    let app = TestApp::new();
    let (owner, _) = app.register("sam", "secret1").await;
    let (_, admin) = app.admin("root").await;
    let id = create(&app, &owner, json!({ "name": "Shelf", "price": 30 })).await;
    let uri = format!("{PRODUCTS}/{id}");

    let denied = app.delete(&uri, &owner).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(
        denied.message(),
        "User role 'user' is not authorized to access this route"
    );

    assert_eq!(app.delete(&uri, &admin).await.status, StatusCode::OK);
    let gone = app.delete(&uri, &admin).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}
