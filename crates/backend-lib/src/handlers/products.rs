//! Product CRUD handlers.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use rbac_common::{
    ApiResponse, CreateProductRequest, Creator, Pagination, ProductQuery, ProductView,
    UpdateProductRequest,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{reply, required, ApiResult};
use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::Product;
use crate::storage::{ProductFilter, Storage};
use crate::AppState;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

fn not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

/// Owner summaries for a batch of products, one lookup per distinct owner
async fn creators<S: Storage>(
    storage: &S,
    products: &[Product],
) -> Result<HashMap<Uuid, Creator>, AppError> {
    let mut found = HashMap::new();
    for owner_id in products.iter().map(|p| p.owner_id) {
        if found.contains_key(&owner_id) {
            continue;
        }
        if let Some(owner) = storage.user_by_id(owner_id).await? {
            found.insert(owner_id, owner.creator());
        }
    }
    Ok(found)
}

/// `GET /products`: newest first, optionally filtered by category
pub async fn list_products<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Vec<ProductView>> {
    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.is_empty()),
        offset: u64::from(page - 1) * u64::from(limit),
        limit,
    };

    let result = state.storage.list_products(&filter).await?;
    let owners = creators(&state.storage, &result.items).await?;
    let items = result
        .items
        .iter()
        .map(|p| p.view(owners.get(&p.owner_id).cloned()))
        .collect();

    reply(
        StatusCode::OK,
        ApiResponse::ok("Products retrieved successfully")
            .with_data(items)
            .with_pagination(Pagination::new(result.total, page, limit)),
    )
}

/// `GET /products/my-products`
pub async fn my_products<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
) -> ApiResult<Vec<ProductView>> {
    let products = state.storage.products_by_owner(ctx.id()).await?;
    let items = products.iter().map(|p| p.view(None)).collect();
    reply(
        StatusCode::OK,
        ApiResponse::ok("Your products retrieved successfully").with_data(items),
    )
}

/// `GET /products/{id}`
pub async fn get_product<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ProductView> {
    let product = state.storage.product_by_id(id).await?.ok_or_else(not_found)?;
    let creator = state
        .storage
        .user_by_id(product.owner_id)
        .await?
        .map(|owner| owner.creator());
    reply(
        StatusCode::OK,
        ApiResponse::ok("Product retrieved successfully").with_data(product.view(creator)),
    )
}

/// `POST /products`: the caller becomes the owner
pub async fn create_product<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<CreateProductRequest>,
) -> ApiResult<ProductView> {
    let (Some(name), Some(price)) = (required(body.name), body.price) else {
        return Err(AppError::Validation(
            "Please provide product name and price".to_string(),
        ));
    };

    let product = Product::new(
        name,
        body.description,
        price,
        body.stock.unwrap_or(0),
        body.category,
        ctx.id(),
    );
    let product = state.storage.insert_product(product).await?;

    info!(product_id = %product.id, name = %product.name, user_id = %ctx.id(), "product created");
    reply(
        StatusCode::CREATED,
        ApiResponse::ok("Product created successfully").with_data(product.view(None)),
    )
}

/// `PUT /products/{id}`: owner or admin; only fields present in the body change
pub async fn update_product<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateProductRequest>,
) -> ApiResult<ProductView> {
    let mut product = state.storage.product_by_id(id).await?.ok_or_else(not_found)?;

    if !ctx.may_modify(product.owner_id) {
        warn!(product_id = %id, user_id = %ctx.id(), "update of foreign product refused");
        return Err(AppError::Forbidden(
            "Not authorized to update this product".to_string(),
        ));
    }

    if let Some(name) = required(body.name) {
        product.name = name;
    }
    if let Some(description) = body.description {
        product.description = description;
    }
    if let Some(price) = body.price {
        product.price = price;
    }
    if let Some(stock) = body.stock {
        product.stock = stock;
    }
    if let Some(category) = body.category {
        product.category = category;
    }
    product.updated_at = Utc::now();

    let product = state.storage.update_product(product).await?;
    info!(product_id = %product.id, user_id = %ctx.id(), "product updated");
    reply(
        StatusCode::OK,
        ApiResponse::ok("Product updated successfully").with_data(product.view(None)),
    )
}

/// `DELETE /products/{id}`: the route admits admins only; ownership is
/// checked again here.
pub async fn delete_product<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    let product = state.storage.product_by_id(id).await?.ok_or_else(not_found)?;

    if !ctx.may_modify(product.owner_id) {
        return Err(AppError::Forbidden(
            "Not authorized to delete this product".to_string(),
        ));
    }

    if !state.storage.delete_product(id).await? {
        return Err(not_found());
    }
    info!(product_id = %id, name = %product.name, user_id = %ctx.id(), "product deleted");
    reply(StatusCode::OK, ApiResponse::ok("Product deleted successfully"))
}
