//! Storefront catalog reads and category administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use jeffy_db::{CategoryRow, ProductQuery, ProductRow};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, require_text, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct StorefrontQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateCategoryRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// GET /api/v1/catalog/products: active products only.
pub(super) async fn list_storefront_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StorefrontQuery>,
) -> Result<Json<ApiResponse<Vec<ProductRow>>>, ApiError> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let rows = jeffy_db::list_products(
        &state.pool,
        &ProductQuery {
            category_slug: query.category.as_deref(),
            search,
            status: Some("active"),
            limit: normalize_limit(query.limit),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// GET /api/v1/catalog/products/{sku}
pub(super) async fn get_storefront_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(sku): Path<String>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;
    let row = jeffy_db::get_active_product_by_sku(&state.pool, &sku)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("product '{sku}'")))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// GET /api/v1/catalog/categories
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryRow>>>, ApiError> {
    let rows = jeffy_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/categories
pub(super) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryRow>>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name, 120)?;
    let slug = match body.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => jeffy_core::slug_from_name(s),
        _ => jeffy_core::slug_from_name(&name),
    };
    if slug.is_empty() {
        return Err(ApiError::validation(rid, "name must contain letters or digits"));
    }

    let row = jeffy_db::create_category(&state.pool, &name, &slug, body.description.as_deref())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}
