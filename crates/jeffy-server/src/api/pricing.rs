use axum::{extract::State, Extension, Json};
use jeffy_core::pricing::{achieved_margin, calculate_cost_breakdown, CostBreakdown, CostInputs};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CalculateRequest {
    #[serde(flatten)]
    pub inputs: CostInputs,
    /// An observed VAT-inclusive shelf price to back-solve the margin for.
    pub shelf_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub(super) struct CalculateResponse {
    pub breakdown: CostBreakdown,
    pub shelf_price_margin: Option<Decimal>,
}

/// POST /api/v1/pricing/calculate: landed cost and selling price, rounded to 2dp.
pub(super) async fn calculate(
    State(_state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CalculateRequest>,
) -> Result<Json<ApiResponse<CalculateResponse>>, ApiError> {
    let rid = &req_id.0;
    let breakdown = calculate_cost_breakdown(&body.inputs)
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;

    let shelf_price_margin = body
        .shelf_price
        .map(|price| {
            achieved_margin(breakdown.effective_cost, price, body.inputs.sales_vat_rate)
                .map(|m| m.round_dp(4))
                .map_err(|e| ApiError::validation(rid, e.to_string()))
        })
        .transpose()?;

    Ok(Json(ApiResponse::new(
        CalculateResponse {
            breakdown: breakdown.rounded(),
            shelf_price_margin,
        },
        req_id.0,
    )))
}
