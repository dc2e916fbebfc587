//! Import shipments and their per-line landed cost.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use jeffy_core::pricing::{
    allocate_shipment_cost, calculate_cost_breakdown, round_money, CostBreakdown, CostInputs,
};
use jeffy_db::{NewShipment, NewShipmentItem, ShipmentItemRow, ShipmentRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, require_text, ApiError, ApiResponse, AppState};

const SHIPMENT_STATUSES: [&str; 4] = ["pending", "in_transit", "arrived", "cleared"];

#[derive(Debug, Deserialize)]
pub(super) struct ListShipmentsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ShipmentItemRequest {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateShipmentRequest {
    pub reference: String,
    pub distributor_id: Option<i64>,
    pub origin_country: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub transport_cost: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<ShipmentItemRequest>,
}

/// Rates applied on top of the shipment's own costs. All default to zero.
#[derive(Debug, Default, Deserialize)]
pub(super) struct CostRatesQuery {
    #[serde(default)]
    pub duty_rate: Decimal,
    #[serde(default)]
    pub import_vat_rate: Decimal,
    #[serde(default)]
    pub sales_vat_rate: Decimal,
    #[serde(default)]
    pub corporate_tax_rate: Decimal,
    #[serde(default)]
    pub profit_margin: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct ShipmentDetail {
    #[serde(flatten)]
    pub shipment: ShipmentRow,
    pub items: Vec<ShipmentItemRow>,
}

#[derive(Debug, Serialize)]
pub(super) struct LineCost {
    pub product_id: i64,
    pub sku: String,
    pub quantity: i32,
    /// This line's share of the shipment transport cost.
    pub allocated_transport: Decimal,
    pub breakdown: CostBreakdown,
}

#[derive(Debug, Serialize)]
pub(super) struct ShipmentCosts {
    pub shipment_id: i64,
    pub reference: String,
    pub transport_cost: Decimal,
    pub lines: Vec<LineCost>,
}

/// Prices every line of a shipment, spreading its transport cost by quantity.
fn line_costs(
    transport_cost: Decimal,
    items: &[ShipmentItemRow],
    rates: &CostRatesQuery,
) -> Result<Vec<LineCost>, jeffy_core::PricingError> {
    let quantities: Vec<u32> = items
        .iter()
        .map(|i| u32::try_from(i.quantity).unwrap_or(0))
        .collect();
    let shares = allocate_shipment_cost(transport_cost, &quantities)?;

    items
        .iter()
        .zip(shares)
        .map(|(item, share)| {
            let per_unit = if item.quantity > 0 {
                share / Decimal::from(item.quantity)
            } else {
                Decimal::ZERO
            };
            let breakdown = calculate_cost_breakdown(&CostInputs {
                base_cost: item.unit_cost,
                transport_per_unit: per_unit,
                duty_rate: rates.duty_rate,
                import_vat_rate: rates.import_vat_rate,
                sales_vat_rate: rates.sales_vat_rate,
                corporate_tax_rate: rates.corporate_tax_rate,
                profit_margin: rates.profit_margin,
                ..CostInputs::default()
            })?;
            Ok(LineCost {
                product_id: item.product_id,
                sku: item.sku.clone(),
                quantity: item.quantity,
                allocated_transport: round_money(share),
                breakdown: breakdown.rounded(),
            })
        })
        .collect()
}

/// GET /api/v1/admin/shipments
pub(super) async fn list_shipments(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListShipmentsQuery>,
) -> Result<Json<ApiResponse<Vec<ShipmentRow>>>, ApiError> {
    let rows = jeffy_db::list_shipments(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/shipments
pub(super) async fn create_shipment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ShipmentDetail>>), ApiError> {
    let rid = &req_id.0;
    let reference = require_text(rid, "reference", &body.reference, 64)?;
    if body.items.is_empty() {
        return Err(ApiError::validation(rid, "items must not be empty"));
    }
    if body
        .items
        .iter()
        .any(|i| i.quantity <= 0 || i.unit_cost.is_sign_negative())
    {
        return Err(ApiError::validation(
            rid,
            "every item needs a positive quantity and a non-negative unit_cost",
        ));
    }
    if body.transport_cost.is_sign_negative() {
        return Err(ApiError::validation(rid, "transport_cost must not be negative"));
    }
    let status = body.status.as_deref().unwrap_or("in_transit");
    if !SHIPMENT_STATUSES.contains(&status) {
        return Err(ApiError::validation(
            rid,
            format!("unknown shipment status '{status}'"),
        ));
    }
    let origin_country = body
        .origin_country
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty());
    if origin_country.as_ref().is_some_and(|c| c.len() != 2) {
        return Err(ApiError::validation(
            rid,
            "origin_country must be a 2-letter ISO code",
        ));
    }

    let shipment = jeffy_db::create_shipment(
        &state.pool,
        &NewShipment {
            reference,
            distributor_id: body.distributor_id,
            origin_country,
            status: status.to_string(),
            transport_cost: body.transport_cost,
            shipped_at: body.shipped_at,
            notes: body.notes,
            items: body
                .items
                .iter()
                .map(|i| NewShipmentItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    unit_cost: i.unit_cost,
                })
                .collect(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;
    let items = jeffy_db::list_shipment_items(&state.pool, shipment.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(shipment_id = shipment.id, reference = %shipment.reference, lines = items.len(), "shipment recorded");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ShipmentDetail { shipment, items }, req_id.0)),
    ))
}

/// GET /api/v1/admin/shipments/{id}/costs
pub(super) async fn shipment_costs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(rates): Query<CostRatesQuery>,
) -> Result<Json<ApiResponse<ShipmentCosts>>, ApiError> {
    let rid = &req_id.0;
    let shipment = jeffy_db::get_shipment(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("shipment {id}")))?;
    let items = jeffy_db::list_shipment_items(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let lines = line_costs(shipment.transport_cost, &items, &rates)
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;

    Ok(Json(ApiResponse::new(
        ShipmentCosts {
            shipment_id: shipment.id,
            reference: shipment.reference,
            transport_cost: shipment.transport_cost,
            lines,
        },
        req_id.0,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: i64, quantity: i32, unit_cost: Decimal) -> ShipmentItemRow {
        ShipmentItemRow {
            id: product_id,
            shipment_id: 1,
            product_id,
            sku: format!("SKU-{product_id}"),
            name: format!("Product {product_id}"),
            quantity,
            unit_cost,
        }
    }

    #[test]
    fn transport_is_split_by_quantity() {
        let items = [item(1, 30, Decimal::new(200, 2)), item(2, 10, Decimal::new(500, 2))];
        let lines = line_costs(Decimal::new(4000, 2), &items, &CostRatesQuery::default()).unwrap();

        assert_eq!(lines[0].allocated_transport, Decimal::new(3000, 2));
        assert_eq!(lines[1].allocated_transport, Decimal::new(1000, 2));
        // 2.00 base + 1.00 freight per unit
        assert_eq!(lines[0].breakdown.total_landed_cost, Decimal::new(300, 2));
        assert_eq!(lines[1].breakdown.total_landed_cost, Decimal::new(600, 2));
    }

    #[test]
    fn rates_flow_into_every_line() {
        let items = [item(1, 1, Decimal::new(1000, 2))];
        let rates = CostRatesQuery {
            duty_rate: Decimal::new(10, 2),
            ..CostRatesQuery::default()
        };
        let lines = line_costs(Decimal::ZERO, &items, &rates).unwrap();
        assert_eq!(lines[0].breakdown.duty, Decimal::new(100, 2));
    }
}
