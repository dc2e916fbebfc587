//! User profiles plus their saved addresses, favorites and cart.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use jeffy_core::domain::UserRole;
use jeffy_db::{
    AddressRow, CartLineRow, FavoriteRow, NewAddress, NewUser, UserQuery, UserRow, UserUpdate,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, parse_status, require_text, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct ListUsersQuery {
    pub role: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserRequest {
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub franchise_id: Option<i64>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateUserRequest {
    pub full_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub role: Option<String>,
    pub franchise_id: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FavoriteRequest {
    pub product_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateAddressRequest {
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct CartLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReplaceCartRequest {
    pub items: Vec<CartLineRequest>,
}

#[derive(Debug, Serialize)]
pub(super) struct CartView {
    pub items: Vec<CartLineRow>,
    pub subtotal: Decimal,
}

impl From<Vec<CartLineRow>> for CartView {
    fn from(items: Vec<CartLineRow>) -> Self {
        let subtotal = items.iter().map(|l| l.line_total).sum();
        Self { items, subtotal }
    }
}

fn normalize_email(rid: &str, email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::validation(
            rid,
            format!("'{email}' is not an email address"),
        )),
    }
}

async fn ensure_user(state: &AppState, rid: &str, id: i64) -> Result<UserRow, ApiError> {
    jeffy_db::get_user(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, format!("user {id}")))
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/users
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<UserRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(role) = query.role.as_deref() {
        parse_status::<UserRole>(rid, role)?;
    }
    let rows = jeffy_db::list_users(
        &state.pool,
        &UserQuery {
            role: query.role.as_deref(),
            search: query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            limit: normalize_limit(query.limit),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/admin/users
pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserRow>>), ApiError> {
    let rid = &req_id.0;
    let email = normalize_email(rid, &body.email)?;
    let role = match body.role.as_deref() {
        Some(r) => parse_status::<UserRole>(rid, r)?,
        None => UserRole::Customer,
    };
    if role == UserRole::Franchise && body.franchise_id.is_none() {
        return Err(ApiError::validation(
            rid,
            "franchise users need a franchise_id",
        ));
    }

    let row = jeffy_db::create_user(
        &state.pool,
        &NewUser {
            email,
            full_name: body.full_name,
            phone: body.phone,
            role: role.to_string(),
            franchise_id: body.franchise_id,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(user_id = row.id, role = %row.role, "user created");
    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// GET /api/v1/admin/users/{id}
pub(super) async fn get_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserRow>>, ApiError> {
    let row = ensure_user(&state, &req_id.0, id).await?;
    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// PATCH /api/v1/admin/users/{id}
pub(super) async fn update_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserRow>>, ApiError> {
    let rid = &req_id.0;
    let role = body
        .role
        .as_deref()
        .map(|r| parse_status::<UserRole>(rid, r))
        .transpose()?;

    let row = jeffy_db::update_user(
        &state.pool,
        id,
        &UserUpdate {
            full_name: body.full_name,
            phone: body.phone,
            role: role.map(|r| r.to_string()),
            franchise_id: body.franchise_id,
            is_active: body.is_active,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?
    .ok_or_else(|| ApiError::not_found(rid, format!("user {id}")))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// DELETE /api/v1/admin/users/{id}: soft delete.
pub(super) async fn delete_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let deleted = jeffy_db::soft_delete_user(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::not_found(rid, format!("user {id}")));
    }
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

/// GET /api/v1/users/{id}/favorites
pub(super) async fn list_favorites(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FavoriteRow>>>, ApiError> {
    let rows = jeffy_db::list_favorites(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/users/{id}/favorites: idempotent.
pub(super) async fn add_favorite(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
    Json(body): Json<FavoriteRequest>,
) -> Result<Json<ApiResponse<Vec<FavoriteRow>>>, ApiError> {
    let rid = &req_id.0;
    jeffy_db::add_favorite(&state.pool, user_id, body.product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let rows = jeffy_db::list_favorites(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// DELETE /api/v1/users/{id}/favorites/{product_id}
pub(super) async fn remove_favorite(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((user_id, product_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let removed = jeffy_db::remove_favorite(&state.pool, user_id, product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !removed {
        return Err(ApiError::not_found(
            rid,
            format!("favorite {product_id} for user {user_id}"),
        ));
    }
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "removed": true }),
        req_id.0,
    )))
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// GET /api/v1/users/{id}/addresses
pub(super) async fn list_addresses(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<AddressRow>>>, ApiError> {
    let rows = jeffy_db::list_addresses(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// POST /api/v1/users/{id}/addresses: geocoded when a Maps key is configured.
///
/// A failed geocode is logged and the address is kept without coordinates.
pub(super) async fn create_address(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
    Json(body): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AddressRow>>), ApiError> {
    let rid = &req_id.0;
    let line1 = require_text(rid, "line1", &body.line1, 200)?;
    let city = require_text(rid, "city", &body.city, 120)?;
    let postal_code = require_text(rid, "postal_code", &body.postal_code, 20)?;
    let country = require_text(rid, "country", &body.country, 2)?.to_ascii_uppercase();
    ensure_user(&state, rid, user_id).await?;

    let mut row = jeffy_db::create_address(
        &state.pool,
        user_id,
        &NewAddress {
            label: body.label,
            line1,
            line2: body.line2,
            city,
            region: body.region,
            postal_code,
            country,
            is_default: body.is_default,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    if let Some(maps) = state.maps.as_ref() {
        match maps.geocode(&row.one_line()).await {
            Ok(found) => {
                jeffy_db::set_address_coordinates(
                    &state.pool,
                    row.id,
                    found.location.lat,
                    found.location.lng,
                )
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
                row.latitude = Some(found.location.lat);
                row.longitude = Some(found.location.lng);
            }
            Err(e) => {
                tracing::warn!(address_id = row.id, error = %e, "address geocoding failed");
            }
        }
    }

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// DELETE /api/v1/users/{id}/addresses/{address_id}
pub(super) async fn delete_address(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((user_id, address_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let deleted = jeffy_db::delete_address(&state.pool, user_id, address_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::not_found(rid, format!("address {address_id}")));
    }
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// GET /api/v1/users/{id}/cart
pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let lines = jeffy_db::get_cart(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(CartView::from(lines), req_id.0)))
}

/// PUT /api/v1/users/{id}/cart: replaces every line.
pub(super) async fn replace_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
    Json(body): Json<ReplaceCartRequest>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let rid = &req_id.0;
    let lines: Vec<(i64, i32)> = body
        .items
        .iter()
        .map(|l| (l.product_id, l.quantity))
        .collect();
    let rows = jeffy_db::replace_cart(&state.pool, user_id, &lines)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(CartView::from(rows), req_id.0)))
}

/// DELETE /api/v1/users/{id}/cart
pub(super) async fn clear_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let removed = jeffy_db::clear_cart(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "removed_lines": removed }),
        req_id.0,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(
            normalize_email("r", " Ops@Example.COM ").unwrap(),
            "ops@example.com"
        );
        assert!(normalize_email("r", "ops@localhost").is_err());
        assert!(normalize_email("r", "@example.com").is_err());
        assert!(normalize_email("r", "nobody").is_err());
    }

    #[test]
    fn cart_view_sums_line_totals() {
        let line = |id: i64, total: i64| CartLineRow {
            product_id: id,
            sku: format!("SKU-{id}"),
            name: "x".to_string(),
            price: Decimal::new(total, 2),
            currency: "GBP".to_string(),
            quantity: 1,
            line_total: Decimal::new(total, 2),
        };
        let view = CartView::from(vec![line(1, 250), line(2, 199)]);
        assert_eq!(view.subtotal, Decimal::new(449, 2));
        assert_eq!(CartView::from(Vec::new()).subtotal, Decimal::ZERO);
    }
}
