//! Delivery assignments, drivers, live locations and ETAs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use jeffy_core::domain::DeliveryStatus;
use jeffy_db::{DeliveryRow, DeliveryStatusChange, DriverLocationRow, DriverRow, DriverUpdate, NewDriver};
use jeffy_maps::{LatLng, MapsError, Waypoint};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;
use crate::realtime::RealtimeEvent;

use super::{
    map_db_error, normalize_limit, parse_status, require_text, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct ListDeliveriesQuery {
    pub status: Option<String>,
    pub driver_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AssignRequest {
    pub order_id: i64,
    pub driver_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeliveryStatusRequest {
    pub status: String,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListDriversQuery {
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateDriverRequest {
    pub user_id: Option<i64>,
    pub full_name: String,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateDriverRequest {
    pub full_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub vehicle: Option<Option<String>>,
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(super) struct EtaResponse {
    pub delivery: DeliveryRow,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn map_maps_error(rid: &str, error: &MapsError) -> ApiError {
    match error {
        MapsError::NoResults(_) => {
            ApiError::validation(rid, "no route found to the delivery address")
        }
        MapsError::QuotaExceeded(_) => {
            tracing::warn!(error = %error, "maps quota exhausted");
            ApiError::new(rid, "unavailable", "maps quota exhausted, try again later")
        }
        _ => {
            tracing::error!(error = %error, "maps request failed");
            ApiError::new(rid, "unavailable", "maps service unavailable")
        }
    }
}

fn check_coordinates(rid: &str, latitude: f64, longitude: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::validation(
            rid,
            "latitude must be within [-90, 90] and longitude within [-180, 180]",
        ));
    }
    Ok(())
}

fn publish_status_change(state: &AppState, change: &DeliveryStatusChange, status: DeliveryStatus) {
    let delivery = &change.delivery;
    state.events.publish(RealtimeEvent::DeliveryStatus {
        delivery_id: delivery.id,
        order_id: delivery.order_id,
        driver_id: delivery.driver_id,
        status,
        at: delivery.updated_at,
    });
    if let Some(order_status) = change.order_status {
        state.events.publish(RealtimeEvent::OrderStatus {
            order_id: delivery.order_id,
            order_number: delivery.order_number.clone(),
            status: order_status,
            at: delivery.updated_at,
        });
    }
}

// ---------------------------------------------------------------------------
// Deliveries
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/deliveries
pub(super) async fn list_deliveries(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<ApiResponse<Vec<DeliveryRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_status::<DeliveryStatus>(rid, status)?;
    }
    let rows = jeffy_db::list_deliveries(
        &state.pool,
        query.status.as_deref(),
        query.driver_id,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/deliveries: assign a driver to an order.
pub(super) async fn assign_delivery(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AssignRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DeliveryRow>>), ApiError> {
    let rid = &req_id.0;
    let row = jeffy_db::assign_delivery(&state.pool, body.order_id, body.driver_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    state.events.publish(RealtimeEvent::DeliveryStatus {
        delivery_id: row.id,
        order_id: row.order_id,
        driver_id: row.driver_id,
        status: DeliveryStatus::Assigned,
        at: row.assigned_at,
    });

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// PATCH /api/v1/admin/deliveries/{id}/status
pub(super) async fn update_delivery_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<DeliveryStatusRequest>,
) -> Result<Json<ApiResponse<DeliveryStatusChange>>, ApiError> {
    let rid = &req_id.0;
    let next: DeliveryStatus = parse_status(rid, &body.status)?;
    let failure_reason = body
        .failure_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    if next == DeliveryStatus::Failed && failure_reason.is_none() {
        return Err(ApiError::validation(
            rid,
            "failure_reason is required when marking a delivery failed",
        ));
    }

    let change = jeffy_db::update_delivery_status(&state.pool, id, next, failure_reason)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    publish_status_change(&state, &change, next);
    Ok(Json(ApiResponse::new(change, req_id.0)))
}

/// POST /api/v1/admin/deliveries/{id}/eta: route from the driver's last ping
/// to the shipping address and store the result.
pub(super) async fn refresh_eta(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<EtaResponse>>, ApiError> {
    let rid = &req_id.0;
    let Some(maps) = state.maps.as_ref() else {
        return Err(ApiError::new(
            rid,
            "unavailable",
            "ETA needs GOOGLE_MAPS_API_KEY to be configured",
        ));
    };

    let route = jeffy_db::get_delivery_route(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("delivery {id}")))?;

    let (Some(lat), Some(lng)) = (route.driver_latitude, route.driver_longitude) else {
        return Err(ApiError::validation(rid, "driver has not reported a location yet"));
    };
    let destination = route
        .shipping_address
        .as_ref()
        .and_then(Waypoint::from_address_json)
        .ok_or_else(|| ApiError::validation(rid, "order has no usable shipping address"))?;

    let summary = maps
        .directions(&Waypoint::Coordinates(LatLng { lat, lng }), &destination)
        .await
        .map_err(|e| map_maps_error(rid, &e))?;

    let eta_seconds = i32::try_from(summary.duration_seconds).unwrap_or(i32::MAX);
    let distance_meters = i32::try_from(summary.distance_meters).unwrap_or(i32::MAX);
    let delivery = jeffy_db::set_delivery_eta(&state.pool, id, eta_seconds, distance_meters)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("delivery {id}")))?;

    tracing::info!(delivery_id = id, eta_seconds, distance_meters, "delivery ETA refreshed");
    Ok(Json(ApiResponse::new(
        EtaResponse {
            delivery,
            summary: summary.summary,
        },
        req_id.0,
    )))
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/drivers
pub(super) async fn list_drivers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListDriversQuery>,
) -> Result<Json<ApiResponse<Vec<DriverRow>>>, ApiError> {
    let rows = jeffy_db::list_drivers(&state.pool, query.available)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/drivers
pub(super) async fn create_driver(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateDriverRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DriverRow>>), ApiError> {
    let rid = &req_id.0;
    let full_name = require_text(rid, "full_name", &body.full_name, 200)?;
    let row = jeffy_db::create_driver(
        &state.pool,
        &NewDriver {
            user_id: body.user_id,
            full_name,
            phone: body.phone,
            vehicle: body.vehicle,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// PATCH /api/v1/admin/drivers/{id}
pub(super) async fn update_driver(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDriverRequest>,
) -> Result<Json<ApiResponse<DriverRow>>, ApiError> {
    let rid = &req_id.0;
    let full_name = body
        .full_name
        .as_deref()
        .map(|n| require_text(rid, "full_name", n, 200))
        .transpose()?;

    let row = jeffy_db::update_driver(
        &state.pool,
        id,
        &DriverUpdate {
            full_name,
            phone: body.phone,
            vehicle: body.vehicle,
            is_available: body.is_available,
            is_active: body.is_active,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?
    .ok_or_else(|| ApiError::not_found(rid, format!("driver {id}")))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// POST /api/v1/admin/drivers/{id}/location: a GPS ping.
pub(super) async fn record_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<LocationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DriverLocationRow>>), ApiError> {
    let rid = &req_id.0;
    check_coordinates(rid, body.latitude, body.longitude)?;
    let heading = body.heading.map(|h| h.rem_euclid(360.0));

    let row = jeffy_db::record_driver_location(
        &state.pool,
        id,
        body.latitude,
        body.longitude,
        heading,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    state.events.publish(RealtimeEvent::DriverLocation {
        driver_id: id,
        latitude: row.latitude,
        longitude: row.longitude,
        heading: row.heading,
        recorded_at: row.recorded_at,
    });

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// GET /api/v1/admin/drivers/{id}/location: most recent ping.
pub(super) async fn latest_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DriverLocationRow>>, ApiError> {
    let rid = &req_id.0;
    let row = jeffy_db::latest_driver_location(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("location for driver {id}")))?;

    let age = Utc::now() - row.recorded_at;
    tracing::debug!(driver_id = id, age_secs = age.num_seconds(), "latest location served");
    Ok(Json(ApiResponse::new(row, req_id.0)))
}
