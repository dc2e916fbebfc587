//! Customer orders: placement, lifecycle and dashboard stats.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use jeffy_core::domain::OrderStatus;
use jeffy_db::{NewOrder, NewOrderLine, OrderItemRow, OrderQuery, OrderRow, OrderStats};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;
use crate::realtime::RealtimeEvent;

use super::{map_db_error, normalize_limit, parse_status, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ListOrdersQuery {
    pub status: Option<String>,
    pub user_id: Option<i64>,
    pub franchise_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderRequest {
    pub user_id: Option<i64>,
    pub franchise_id: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub delivery_fee: Decimal,
    pub shipping_address: Option<serde_json::Value>,
    pub referral_code: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatsQuery {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

/// GET /api/v1/admin/orders
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_status::<OrderStatus>(rid, status)?;
    }
    let rows = jeffy_db::list_orders(
        &state.pool,
        &OrderQuery {
            status: query.status.as_deref(),
            user_id: query.user_id,
            franchise_id: query.franchise_id,
            limit: normalize_limit(query.limit),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// GET /api/v1/admin/orders/{id}
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let rid = &req_id.0;
    let order = jeffy_db::get_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("order {id}")))?;
    let items = jeffy_db::list_order_items(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(OrderDetail { order, items }, req_id.0)))
}

/// POST /api/v1/admin/orders: prices lines from the catalog and reserves stock.
pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ApiError> {
    let rid = &req_id.0;

    if body.items.is_empty() {
        return Err(ApiError::validation(rid, "items must not be empty"));
    }
    if let Some(line) = body.items.iter().find(|l| l.quantity <= 0) {
        return Err(ApiError::validation(
            rid,
            format!("quantity for product {} must be positive", line.product_id),
        ));
    }
    if body
        .shipping_address
        .as_ref()
        .is_some_and(|a| !a.is_object())
    {
        return Err(ApiError::validation(rid, "shipping_address must be an object"));
    }
    let currency = body
        .currency
        .as_deref()
        .map_or_else(|| state.default_currency.clone(), str::to_ascii_uppercase);

    let new_order = NewOrder {
        user_id: body.user_id,
        franchise_id: body.franchise_id,
        currency,
        delivery_fee: body.delivery_fee,
        shipping_address: body.shipping_address,
        referral_code: body
            .referral_code
            .filter(|c| !c.trim().is_empty()),
        notes: body.notes,
        items: body
            .items
            .iter()
            .map(|l| NewOrderLine {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect(),
    };

    let (order, items) = jeffy_db::create_order(&state.pool, &new_order, Utc::now())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    state.events.publish(RealtimeEvent::OrderStatus {
        order_id: order.id,
        order_number: order.order_number.clone(),
        status: OrderStatus::Pending,
        at: order.created_at,
    });

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(OrderDetail { order, items }, req_id.0)),
    ))
}

/// PATCH /api/v1/admin/orders/{id}/status
pub(super) async fn update_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<ApiResponse<OrderRow>>, ApiError> {
    let rid = &req_id.0;
    let next: OrderStatus = parse_status(rid, &body.status)?;

    let row = jeffy_db::update_order_status(&state.pool, id, next)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    state.events.publish(RealtimeEvent::OrderStatus {
        order_id: row.id,
        order_number: row.order_number.clone(),
        status: next,
        at: row.updated_at,
    });

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// GET /api/v1/admin/orders/stats
pub(super) async fn order_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<OrderStats>>, ApiError> {
    let stats = jeffy_db::order_stats(&state.pool, query.since)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(stats, req_id.0)))
}
