use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{new_product, product_changes, ProductRepresentation};
use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    models::Product,
    query::{ListQuery, PRODUCT_LISTING},
    schema::WriteMode,
    state::AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products/", get(list_products).post(create_product))
        .route(
            "/products/:slug/",
            get(get_product)
                .put(replace_product)
                .patch(patch_product)
                .delete(delete_product),
        )
}

async fn find_or_404(state: &AppState, slug: &str) -> Result<Product, ApiError> {
    state
        .catalog
        .find_product(slug)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `?category=<slug>&search=<terms>&ordering=<fields>`, all optional.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ProductRepresentation>>, ApiError> {
    let query = ListQuery::from_params(&PRODUCT_LISTING, &params);
    let products = state.catalog.list_products(&query).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductRepresentation>, ApiError> {
    let product = find_or_404(&state, &slug).await?;
    Ok(Json(product.into()))
}

#[instrument(skip(state, body))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductRepresentation>), ApiError> {
    let Json(body) = body?;
    let new = match new_product(body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "invalid product payload");
            return Err(e);
        }
    };

    let product = match state.catalog.create_product(new).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "create product failed");
            return Err(e.into());
        }
    };

    info!(%user_id, slug = %product.slug, category = %product.category_name, "product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

#[instrument(skip(state, body))]
pub async fn replace_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProductRepresentation>, ApiError> {
    update_product(&state, user_id, &slug, body, WriteMode::Replace).await
}

#[instrument(skip(state, body))]
pub async fn patch_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProductRepresentation>, ApiError> {
    update_product(&state, user_id, &slug, body, WriteMode::Partial).await
}

async fn update_product(
    state: &AppState,
    user_id: Uuid,
    slug: &str,
    body: Result<Json<Value>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<ProductRepresentation>, ApiError> {
    let current = find_or_404(state, slug).await?;
    let Json(body) = body?;
    let changes = match product_changes(body, mode, &current) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, %slug, "invalid product payload");
            return Err(e);
        }
    };

    let product = match state.catalog.update_product(current.id, changes).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, %slug, "update product failed");
            return Err(e.into());
        }
    };

    info!(%user_id, slug = %product.slug, ?mode, "product updated");
    Ok(Json(product.into()))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product = find_or_404(&state, &slug).await?;
    state.catalog.delete_product(product.id).await?;
    info!(%user_id, %slug, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}
