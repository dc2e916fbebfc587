//! Referral campaigns, code issuance and checkout validation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use jeffy_core::referral::{CampaignTerms, RewardKind};
use jeffy_db::{CampaignRow, NewCampaign, ReferralCodeRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, require_text, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ListCampaignsQuery {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateCampaignRequest {
    pub name: String,
    pub code_prefix: Option<String>,
    pub reward_kind: String,
    pub reward_value: Decimal,
    #[serde(default)]
    pub min_order_total: Decimal,
    pub max_redemptions: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CreateCodeRequest {
    pub referrer_user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ValidateCodeRequest {
    pub code: String,
    pub order_total: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct ValidateCodeResponse {
    pub code: String,
    pub campaign_id: i64,
    pub discount: Decimal,
    pub total_after_discount: Decimal,
}

/// GET /api/v1/admin/referrals/campaigns
pub(super) async fn list_campaigns(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<ApiResponse<Vec<CampaignRow>>>, ApiError> {
    let rows = jeffy_db::list_campaigns(&state.pool, query.active)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/referrals/campaigns
pub(super) async fn create_campaign(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CampaignRow>>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name, 200)?;
    let reward_kind: RewardKind = body
        .reward_kind
        .parse()
        .map_err(|e: jeffy_core::ReferralError| ApiError::validation(rid, e.to_string()))?;
    let terms = CampaignTerms {
        reward_kind,
        reward_value: body.reward_value,
        min_order_total: body.min_order_total,
        max_redemptions: body.max_redemptions,
        starts_at: body.starts_at,
        ends_at: body.ends_at,
        is_active: true,
    };
    terms
        .validate()
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;

    let code_prefix = body
        .code_prefix
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map_or_else(|| "JEFFY".to_string(), str::to_ascii_uppercase);

    let row = jeffy_db::create_campaign(
        &state.pool,
        &NewCampaign {
            name,
            code_prefix,
            terms,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(campaign_id = row.id, name = %row.name, "referral campaign created");
    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// POST /api/v1/admin/referrals/campaigns/{id}/codes
pub(super) async fn create_code(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<i64>,
    body: Option<Json<CreateCodeRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<ReferralCodeRow>>), ApiError> {
    let rid = &req_id.0;
    let referrer = body.and_then(|Json(b)| b.referrer_user_id);
    let row = jeffy_db::create_referral_code(&state.pool, campaign_id, referrer)
        .await
        .map_err(|e| match e {
            jeffy_db::DbError::NotFound => {
                ApiError::not_found(rid, format!("campaign {campaign_id}"))
            }
            other => map_db_error(rid.clone(), &other),
        })?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// POST /api/v1/referrals/validate: quotes a discount without redeeming it.
pub(super) async fn validate_code(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ValidateCodeRequest>,
) -> Result<Json<ApiResponse<ValidateCodeResponse>>, ApiError> {
    let rid = &req_id.0;
    let code = require_text(rid, "code", &body.code, 64)?;
    if body.order_total.is_sign_negative() {
        return Err(ApiError::validation(rid, "order_total must not be negative"));
    }

    let (code_row, discount) =
        jeffy_db::quote_referral_discount(&state.pool, &code, body.order_total, Utc::now())
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        ValidateCodeResponse {
            code: code_row.code,
            campaign_id: code_row.campaign_id,
            discount,
            total_after_discount: body.order_total - discount,
        },
        req_id.0,
    )))
}
