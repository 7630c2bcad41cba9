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

use super::dto::{category_changes, new_category, CategoryRepresentation};
use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    models::Category,
    query::{ListQuery, CATEGORY_LISTING},
    schema::WriteMode,
    state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories/", get(list_categories).post(create_category))
        .route(
            "/categories/:slug/",
            get(get_category)
                .put(replace_category)
                .patch(patch_category)
                .delete(delete_category),
        )
}

async fn find_or_404(state: &AppState, slug: &str) -> Result<Category, ApiError> {
    state
        .catalog
        .find_category(slug)
        .await?
        .ok_or(ApiError::NotFound)
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<CategoryRepresentation>>, ApiError> {
    let query = ListQuery::from_params(&CATEGORY_LISTING, &params);
    let categories = state.catalog.list_categories(&query).await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryRepresentation>, ApiError> {
    let category = find_or_404(&state, &slug).await?;
    Ok(Json(category.into()))
}

#[instrument(skip(state, body))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CategoryRepresentation>), ApiError> {
    let Json(body) = body?;
    let new = match new_category(body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "invalid category payload");
            return Err(e);
        }
    };

    let category = match state.catalog.create_category(new).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "create category failed");
            return Err(e.into());
        }
    };

    info!(%user_id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[instrument(skip(state, body))]
pub async fn replace_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CategoryRepresentation>, ApiError> {
    update_category(&state, user_id, &slug, body, WriteMode::Replace).await
}

#[instrument(skip(state, body))]
pub async fn patch_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CategoryRepresentation>, ApiError> {
    update_category(&state, user_id, &slug, body, WriteMode::Partial).await
}

async fn update_category(
    state: &AppState,
    user_id: Uuid,
    slug: &str,
    body: Result<Json<Value>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<CategoryRepresentation>, ApiError> {
    let current = find_or_404(state, slug).await?;
    let Json(body) = body?;
    let changes = match category_changes(body, mode, &current) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, %slug, "invalid category payload");
            return Err(e);
        }
    };

    let category = match state.catalog.update_category(current.id, changes).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, %slug, "update category failed");
            return Err(e.into());
        }
    };

    info!(%user_id, slug = %category.slug, ?mode, "category updated");
    Ok(Json(category.into()))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let category = find_or_404(&state, &slug).await?;
    let removed_products = state.catalog.delete_category(category.id).await?;
    info!(%user_id, %slug, removed_products, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
