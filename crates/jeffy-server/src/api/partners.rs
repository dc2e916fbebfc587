//! Distributors (upstream suppliers) and franchises (downstream stores).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use jeffy_db::{DistributorRow, DistributorUpdate, FranchiseRow, NewDistributor};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, require_text, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateDistributorRequest {
    pub name: String,
    pub slug: Option<String>,
    pub country: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub lead_time_days: i32,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateDistributorRequest {
    pub name: Option<String>,
    pub country: Option<Option<String>>,
    pub contact_email: Option<Option<String>>,
    pub contact_phone: Option<Option<String>>,
    pub lead_time_days: Option<i32>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateFranchiseRequest {
    pub name: String,
    pub slug: Option<String>,
    pub city: Option<String>,
    pub contact_email: Option<String>,
}

fn resolve_slug(rid: &str, explicit: Option<&str>, name: &str) -> Result<String, ApiError> {
    let slug = match explicit.map(str::trim) {
        Some(s) if !s.is_empty() => jeffy_core::slug_from_name(s),
        _ => jeffy_core::slug_from_name(name),
    };
    if slug.is_empty() {
        return Err(ApiError::validation(rid, "name must contain letters or digits"));
    }
    Ok(slug)
}

fn check_email(rid: &str, email: Option<&str>) -> Result<(), ApiError> {
    match email {
        Some(e) if !e.contains('@') => Err(ApiError::validation(
            rid,
            format!("contact_email '{e}' is not an email address"),
        )),
        _ => Ok(()),
    }
}

fn check_lead_time(rid: &str, days: i32) -> Result<(), ApiError> {
    if (0..=365).contains(&days) {
        Ok(())
    } else {
        Err(ApiError::validation(rid, "lead_time_days must be within [0, 365]"))
    }
}

async fn distributor_by_slug(
    state: &AppState,
    rid: &str,
    slug: &str,
) -> Result<DistributorRow, ApiError> {
    jeffy_db::get_distributor_by_slug(&state.pool, slug)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("distributor '{slug}'")))
}

/// GET /api/v1/admin/distributors
pub(super) async fn list_distributors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<DistributorRow>>>, ApiError> {
    let rows = jeffy_db::list_distributors(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/distributors
pub(super) async fn create_distributor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateDistributorRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DistributorRow>>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name, 200)?;
    let slug = resolve_slug(rid, body.slug.as_deref(), &name)?;
    check_email(rid, body.contact_email.as_deref())?;
    check_lead_time(rid, body.lead_time_days)?;

    let row = jeffy_db::create_distributor(
        &state.pool,
        &NewDistributor {
            name,
            slug,
            country: body.country.map(|c| c.trim().to_ascii_uppercase()),
            contact_email: body.contact_email,
            contact_phone: body.contact_phone,
            lead_time_days: body.lead_time_days,
            notes: body.notes,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(distributor_id = row.id, slug = %row.slug, "distributor created");
    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// GET /api/v1/admin/distributors/{slug}
pub(super) async fn get_distributor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<DistributorRow>>, ApiError> {
    let row = distributor_by_slug(&state, &req_id.0, &slug).await?;
    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// PATCH /api/v1/admin/distributors/{slug}
pub(super) async fn update_distributor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
    Json(body): Json<UpdateDistributorRequest>,
) -> Result<Json<ApiResponse<DistributorRow>>, ApiError> {
    let rid = &req_id.0;
    let name = body
        .name
        .as_deref()
        .map(|n| require_text(rid, "name", n, 200))
        .transpose()?;
    if let Some(Some(email)) = body.contact_email.as_ref() {
        check_email(rid, Some(email))?;
    }
    if let Some(days) = body.lead_time_days {
        check_lead_time(rid, days)?;
    }

    let existing = distributor_by_slug(&state, rid, &slug).await?;
    let row = jeffy_db::update_distributor(
        &state.pool,
        existing.id,
        &DistributorUpdate {
            name,
            country: body
                .country
                .map(|c| c.map(|c| c.trim().to_ascii_uppercase())),
            contact_email: body.contact_email,
            contact_phone: body.contact_phone,
            lead_time_days: body.lead_time_days,
            notes: body.notes,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?
    .ok_or_else(|| ApiError::not_found(rid, format!("distributor '{slug}'")))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// DELETE /api/v1/admin/distributors/{slug}: deactivates, keeping history.
pub(super) async fn deactivate_distributor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let existing = distributor_by_slug(&state, rid, &slug).await?;
    let deactivated = jeffy_db::deactivate_distributor(&state.pool, existing.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deactivated {
        return Err(ApiError::not_found(rid, format!("distributor '{slug}'")));
    }

    tracing::info!(distributor_id = existing.id, %slug, "distributor deactivated");
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deactivated": true }),
        req_id.0,
    )))
}

/// GET /api/v1/admin/franchises
pub(super) async fn list_franchises(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<FranchiseRow>>>, ApiError> {
    let rows = jeffy_db::list_franchises(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/franchises
pub(super) async fn create_franchise(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateFranchiseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FranchiseRow>>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name, 200)?;
    let slug = resolve_slug(rid, body.slug.as_deref(), &name)?;
    check_email(rid, body.contact_email.as_deref())?;

    let row = jeffy_db::create_franchise(
        &state.pool,
        &name,
        &slug,
        body.city.as_deref(),
        body.contact_email.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}
