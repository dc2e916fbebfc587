//! Franchise stock orders and allocation of central stock.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use jeffy_core::domain::StockOrderStatus;
use jeffy_db::{
    AllocationSummary, NewStockOrder, NewStockOrderItem, StockOrderItemRow, StockOrderQuery,
    StockOrderRow,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, parse_status, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ListStockOrdersQuery {
    pub status: Option<String>,
    pub franchise_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StockOrderLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateStockOrderRequest {
    pub franchise_id: i64,
    pub notes: Option<String>,
    #[serde(default = "default_submit")]
    pub submit: bool,
    pub items: Vec<StockOrderLineRequest>,
}

fn default_submit() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(super) struct AllocateRequest {
    /// Restrict the run to these submitted orders; all of them when absent.
    pub stock_order_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StockOrderDetail {
    #[serde(flatten)]
    pub order: StockOrderRow,
    pub items: Vec<StockOrderItemRow>,
}

async fn load_detail(state: &AppState, rid: &str, id: i64) -> Result<StockOrderDetail, ApiError> {
    let order = jeffy_db::get_stock_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("stock order {id}")))?;
    let items = jeffy_db::list_stock_order_items(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    Ok(StockOrderDetail { order, items })
}

/// GET /api/v1/admin/stock-orders
pub(super) async fn list_stock_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListStockOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<StockOrderRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_status::<StockOrderStatus>(rid, status)?;
    }
    let rows = jeffy_db::list_stock_orders(
        &state.pool,
        &StockOrderQuery {
            status: query.status.as_deref(),
            franchise_id: query.franchise_id,
            limit: normalize_limit(query.limit),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/stock-orders
pub(super) async fn create_stock_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateStockOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StockOrderDetail>>), ApiError> {
    let rid = &req_id.0;
    if let Some(line) = body.items.iter().find(|l| l.quantity <= 0) {
        return Err(ApiError::validation(
            rid,
            format!("quantity for product {} must be positive", line.product_id),
        ));
    }

    let order = jeffy_db::create_stock_order(
        &state.pool,
        &NewStockOrder {
            franchise_id: body.franchise_id,
            notes: body.notes,
            submit: body.submit,
            items: body
                .items
                .iter()
                .map(|l| NewStockOrderItem {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect(),
        },
        Utc::now(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        stock_order_id = order.id,
        order_number = %order.order_number,
        status = %order.status,
        "stock order created"
    );
    let detail = load_detail(&state, rid, order.id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(detail, req_id.0))))
}

/// GET /api/v1/admin/stock-orders/{id}
pub(super) async fn get_stock_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<StockOrderDetail>>, ApiError> {
    let detail = load_detail(&state, &req_id.0, id).await?;
    Ok(Json(ApiResponse::new(detail, req_id.0)))
}

/// POST /api/v1/admin/stock-orders/allocate: fair-share run over submitted orders.
pub(super) async fn allocate_all(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Option<Json<AllocateRequest>>,
) -> Result<Json<ApiResponse<AllocationSummary>>, ApiError> {
    let rid = &req_id.0;
    let targets = body.and_then(|Json(b)| b.stock_order_ids);
    let summary = jeffy_db::allocate_stock_orders(&state.pool, targets.as_deref())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        orders = summary.orders_allocated,
        units = summary.units_allocated,
        short = summary.units_short,
        "stock allocation run"
    );
    Ok(Json(ApiResponse::new(summary, req_id.0)))
}

/// POST /api/v1/admin/stock-orders/{id}/allocate
pub(super) async fn allocate_one(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<StockOrderDetail>>, ApiError> {
    let rid = &req_id.0;
    let current = load_detail(&state, rid, id).await?;
    if current.order.status != StockOrderStatus::Submitted.as_str() {
        return Err(ApiError::validation(
            rid,
            format!(
                "stock order {id} is {} and cannot be allocated",
                current.order.status
            ),
        ));
    }

    jeffy_db::allocate_stock_orders(&state.pool, Some(&[id]))
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let detail = load_detail(&state, rid, id).await?;
    Ok(Json(ApiResponse::new(detail, req_id.0)))
}

/// PATCH /api/v1/admin/stock-orders/{id}/status
pub(super) async fn update_stock_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<ApiResponse<StockOrderRow>>, ApiError> {
    let rid = &req_id.0;
    let next: StockOrderStatus = parse_status(rid, &body.status)?;
    let row = jeffy_db::update_stock_order_status(&state.pool, id, next)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}
