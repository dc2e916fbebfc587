use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use jeffy_core::domain::ProcurementStatus;
use jeffy_db::{NewProcurement, ProcurementRow, ProcurementUpdate};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, parse_status, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ListProcurementQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProcurementRequest {
    pub product_id: i64,
    pub distributor_id: Option<i64>,
    pub quantity: i32,
    #[serde(default)]
    pub priority: i16,
    pub requested_by: Option<String>,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateProcurementRequest {
    pub status: Option<String>,
    pub quantity: Option<i32>,
    pub priority: Option<i16>,
    pub distributor_id: Option<Option<i64>>,
    pub notes: Option<Option<String>>,
}

fn check_priority(rid: &str, priority: i16) -> Result<(), ApiError> {
    if (0..=10).contains(&priority) {
        Ok(())
    } else {
        Err(ApiError::validation(rid, "priority must be within [0, 10]"))
    }
}

/// GET /api/v1/admin/procurement
pub(super) async fn list_procurement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListProcurementQuery>,
) -> Result<Json<ApiResponse<Vec<ProcurementRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_status::<ProcurementStatus>(rid, status)?;
    }
    let rows = jeffy_db::list_procurement(
        &state.pool,
        query.status.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/procurement
pub(super) async fn create_procurement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProcurementRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProcurementRow>>), ApiError> {
    let rid = &req_id.0;
    check_priority(rid, body.priority)?;

    let row = jeffy_db::create_procurement(
        &state.pool,
        &NewProcurement {
            product_id: body.product_id,
            distributor_id: body.distributor_id,
            quantity: body.quantity,
            priority: body.priority,
            requested_by: body.requested_by,
            notes: body.notes,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(entry_id = row.id, sku = %row.sku, quantity = row.quantity, "procurement queued");
    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// PATCH /api/v1/admin/procurement/{id}: moving to `received` books the stock in.
pub(super) async fn update_procurement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProcurementRequest>,
) -> Result<Json<ApiResponse<ProcurementRow>>, ApiError> {
    let rid = &req_id.0;
    let status = body
        .status
        .as_deref()
        .map(|s| parse_status::<ProcurementStatus>(rid, s))
        .transpose()?;
    if let Some(priority) = body.priority {
        check_priority(rid, priority)?;
    }

    let row = jeffy_db::update_procurement(
        &state.pool,
        id,
        &ProcurementUpdate {
            status,
            quantity: body.quantity,
            priority: body.priority,
            distributor_id: body.distributor_id,
            notes: body.notes,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// DELETE /api/v1/admin/procurement/{id}: only queued or cancelled entries.
pub(super) async fn delete_procurement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    jeffy_db::delete_procurement(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}
