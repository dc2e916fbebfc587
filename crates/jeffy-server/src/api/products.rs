//! Admin product CRUD and stock adjustments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use jeffy_core::domain::ProductStatus;
use jeffy_db::{NewProduct, ProductQuery, ProductRow, ProductUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, parse_status, require_text, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct AdminProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub status: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// Option<Option<T>> is intentional: outer None = "not in request" (keep current),
// Some(None) = "explicitly cleared", Some(Some(v)) = "set to value" (PATCH semantics).
#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<i64>>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Option<Decimal>>,
    pub cost_price: Option<Option<Decimal>>,
    pub status: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AdjustStockRequest {
    pub delta: i32,
    pub reason: Option<String>,
}

fn check_money(rid: &str, field: &str, value: Decimal) -> Result<(), ApiError> {
    if value.is_sign_negative() {
        return Err(ApiError::validation(rid, format!("{field} must not be negative")));
    }
    Ok(())
}

fn check_currency(rid: &str, value: &str) -> Result<String, ApiError> {
    let code = value.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ApiError::validation(
            rid,
            format!("currency must be a 3-letter ISO code, got '{value}'"),
        ))
    }
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// GET /api/v1/admin/products: every non-deleted product, any status.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_status::<ProductStatus>(rid, status)?;
    }
    let rows = jeffy_db::list_products(
        &state.pool,
        &ProductQuery {
            category_slug: query.category.as_deref(),
            search: query.search.as_deref().filter(|s| !s.trim().is_empty()),
            status: query.status.as_deref(),
            limit: normalize_limit(query.limit),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// GET /api/v1/admin/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;
    let row = jeffy_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("product {id}")))?;
    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// POST /api/v1/admin/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductRow>>), ApiError> {
    let rid = &req_id.0;

    let sku = require_text(rid, "sku", &body.sku, 64)?.to_ascii_uppercase();
    let name = require_text(rid, "name", &body.name, 200)?;
    check_money(rid, "price", body.price)?;
    if let Some(v) = body.compare_at_price {
        check_money(rid, "compare_at_price", v)?;
    }
    if let Some(v) = body.cost_price {
        check_money(rid, "cost_price", v)?;
    }
    if body.stock_quantity < 0 {
        return Err(ApiError::validation(rid, "stock_quantity must not be negative"));
    }
    let status = match body.status.as_deref() {
        Some(s) => parse_status::<ProductStatus>(rid, s)?,
        None => ProductStatus::Draft,
    };
    let currency = match body.currency.as_deref() {
        Some(c) => check_currency(rid, c)?,
        None => state.default_currency.clone(),
    };

    let row = jeffy_db::create_product(
        &state.pool,
        &NewProduct {
            sku,
            name,
            description: body.description,
            category_id: body.category_id,
            price: body.price,
            compare_at_price: body.compare_at_price,
            cost_price: body.cost_price,
            currency,
            stock_quantity: body.stock_quantity,
            status: status.to_string(),
            image_urls: clean_list(&body.image_urls),
            tags: clean_list(&body.tags),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(product_id = row.id, sku = %row.sku, "product created");
    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// PATCH /api/v1/admin/products/{id}: sparse update.
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;

    let name = body
        .name
        .as_deref()
        .map(|n| require_text(rid, "name", n, 200))
        .transpose()?;
    if let Some(price) = body.price {
        check_money(rid, "price", price)?;
    }
    if let Some(Some(v)) = body.compare_at_price {
        check_money(rid, "compare_at_price", v)?;
    }
    if let Some(Some(v)) = body.cost_price {
        check_money(rid, "cost_price", v)?;
    }
    let status = body
        .status
        .as_deref()
        .map(|s| parse_status::<ProductStatus>(rid, s))
        .transpose()?;

    let update = ProductUpdate {
        name,
        description: body.description,
        category_id: body.category_id,
        price: body.price,
        compare_at_price: body.compare_at_price,
        cost_price: body.cost_price,
        status: status.map(|s| s.to_string()),
        image_urls: body.image_urls.as_deref().map(clean_list),
        tags: body.tags.as_deref().map(clean_list),
    };

    let row = jeffy_db::update_product(&state.pool, id, &update)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("product {id}")))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// DELETE /api/v1/admin/products/{id}: soft delete.
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let deleted = jeffy_db::soft_delete_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::not_found(rid, format!("product {id}")));
    }

    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}

/// POST /api/v1/admin/products/{id}/stock
pub(super) async fn adjust_stock(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<AdjustStockRequest>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;
    if body.delta == 0 {
        return Err(ApiError::validation(rid, "delta must be non-zero"));
    }

    let row = jeffy_db::adjust_stock(&state.pool, id, body.delta)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        product_id = id,
        delta = body.delta,
        reason = body.reason.as_deref().unwrap_or(""),
        stock = row.stock_quantity,
        "manual stock adjustment"
    );
    Ok(Json(ApiResponse::new(row, req_id.0)))
}
