mod catalog;
mod deliveries;
mod exports;
mod orders;
mod partners;
mod pricing;
mod procurement;
mod products;
mod realtime;
mod referrals;
mod shipments;
mod stock_orders;
mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use jeffy_db::DbError;
use jeffy_maps::MapsClient;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};
use crate::realtime::EventBus;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub events: EventBus,
    /// `None` when no Maps key is configured; ETA and geocoding are skipped.
    pub maps: Option<Arc<MapsClient>>,
    pub default_currency: String,
}

impl AppState {
    /// State with no Maps client, a fresh event bus and GBP as the currency.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            events: EventBus::default(),
            maps: None,
            default_currency: "GBP".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    maps: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub(super) fn not_found(request_id: &str, what: impl std::fmt::Display) -> Self {
        Self::new(request_id, "not_found", format!("{what} not found"))
    }

    pub(super) fn validation(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, "validation_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

/// Translates a [`DbError`] into the API error vocabulary. Only unexpected
/// database failures are logged; the rest are client errors.
pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        DbError::Validation(message) => ApiError::new(request_id, "validation_error", message),
        DbError::Domain(e) => ApiError::new(request_id, "validation_error", e.to_string()),
        DbError::Referral(e) => ApiError::new(request_id, "validation_error", e.to_string()),
        DbError::InsufficientStock { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        _ if error.is_unique_violation() => {
            ApiError::new(request_id, "conflict", "a record with that key already exists")
        }
        _ if error.is_foreign_key_violation() => ApiError::new(
            request_id,
            "validation_error",
            "a referenced record does not exist",
        ),
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Trims `value` and checks its length is within `1..=max` characters.
pub(super) fn require_text(
    request_id: &str,
    field: &str,
    value: &str,
    max: usize,
) -> Result<String, ApiError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(ApiError::validation(
            request_id,
            format!("{field} must be 1-{max} characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Parses one of the lowercase status strings from `jeffy_core::domain`.
pub(super) fn parse_status<T>(request_id: &str, value: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = jeffy_core::DomainError>,
{
    value
        .trim()
        .parse()
        .map_err(|e: jeffy_core::DomainError| ApiError::validation(request_id, e.to_string()))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/catalog/products",
            get(catalog::list_storefront_products),
        )
        .route(
            "/api/v1/catalog/products/{sku}",
            get(catalog::get_storefront_product),
        )
        .route("/api/v1/catalog/categories", get(catalog::list_categories))
        .route("/api/v1/pricing/calculate", post(pricing::calculate))
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        // Catalog administration
        .route(
            "/api/v1/admin/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/v1/admin/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/api/v1/admin/products/{id}/stock",
            post(products::adjust_stock),
        )
        .route("/api/v1/admin/categories", post(catalog::create_category))
        // Orders
        .route(
            "/api/v1/admin/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/api/v1/admin/orders/stats", get(orders::order_stats))
        .route("/api/v1/admin/orders/{id}", get(orders::get_order))
        .route(
            "/api/v1/admin/orders/{id}/status",
            patch(orders::update_order_status),
        )
        // Deliveries and drivers
        .route(
            "/api/v1/admin/deliveries",
            get(deliveries::list_deliveries).post(deliveries::assign_delivery),
        )
        .route(
            "/api/v1/admin/deliveries/{id}/status",
            patch(deliveries::update_delivery_status),
        )
        .route(
            "/api/v1/admin/deliveries/{id}/eta",
            post(deliveries::refresh_eta),
        )
        .route(
            "/api/v1/admin/drivers",
            get(deliveries::list_drivers).post(deliveries::create_driver),
        )
        .route(
            "/api/v1/admin/drivers/{id}",
            patch(deliveries::update_driver),
        )
        .route(
            "/api/v1/admin/drivers/{id}/location",
            get(deliveries::latest_location).post(deliveries::record_location),
        )
        // Partners
        .route(
            "/api/v1/admin/distributors",
            get(partners::list_distributors).post(partners::create_distributor),
        )
        .route(
            "/api/v1/admin/distributors/{slug}",
            get(partners::get_distributor)
                .patch(partners::update_distributor)
                .delete(partners::deactivate_distributor),
        )
        .route(
            "/api/v1/admin/franchises",
            get(partners::list_franchises).post(partners::create_franchise),
        )
        // Procurement and franchise stock orders
        .route(
            "/api/v1/admin/procurement",
            get(procurement::list_procurement).post(procurement::create_procurement),
        )
        .route(
            "/api/v1/admin/procurement/{id}",
            patch(procurement::update_procurement).delete(procurement::delete_procurement),
        )
        .route(
            "/api/v1/admin/stock-orders",
            get(stock_orders::list_stock_orders).post(stock_orders::create_stock_order),
        )
        .route(
            "/api/v1/admin/stock-orders/allocate",
            post(stock_orders::allocate_all),
        )
        .route(
            "/api/v1/admin/stock-orders/{id}",
            get(stock_orders::get_stock_order),
        )
        .route(
            "/api/v1/admin/stock-orders/{id}/allocate",
            post(stock_orders::allocate_one),
        )
        .route(
            "/api/v1/admin/stock-orders/{id}/status",
            patch(stock_orders::update_stock_order_status),
        )
        // Accounting
        .route(
            "/api/v1/admin/shipments",
            get(shipments::list_shipments).post(shipments::create_shipment),
        )
        .route(
            "/api/v1/admin/shipments/{id}/costs",
            get(shipments::shipment_costs),
        )
        // Referrals
        .route(
            "/api/v1/admin/referrals/campaigns",
            get(referrals::list_campaigns).post(referrals::create_campaign),
        )
        .route(
            "/api/v1/admin/referrals/campaigns/{id}/codes",
            post(referrals::create_code),
        )
        .route("/api/v1/referrals/validate", post(referrals::validate_code))
        // Users and storefront accounts
        .route(
            "/api/v1/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/v1/admin/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/api/v1/users/{id}/favorites",
            get(users::list_favorites).post(users::add_favorite),
        )
        .route(
            "/api/v1/users/{id}/favorites/{product_id}",
            delete(users::remove_favorite),
        )
        .route(
            "/api/v1/users/{id}/addresses",
            get(users::list_addresses).post(users::create_address),
        )
        .route(
            "/api/v1/users/{id}/addresses/{address_id}",
            delete(users::delete_address),
        )
        .route(
            "/api/v1/users/{id}/cart",
            get(users::get_cart)
                .put(users::replace_cart)
                .delete(users::clear_cart),
        )
        // Exports and realtime feeds
        .route(
            "/api/v1/admin/exports/orders.csv",
            get(exports::export_orders),
        )
        .route(
            "/api/v1/admin/exports/products.csv",
            get(exports::export_products),
        )
        .route("/api/v1/realtime/orders", get(realtime::order_feed))
        .route("/api/v1/realtime/drivers", get(realtime::driver_feed))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .merge(public_router())
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Skips SSE and tiny bodies; mostly pays off on CSV exports.
                .layer(CompressionLayer::new())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let maps = if state.maps.is_some() {
        "configured"
    } else {
        "disabled"
    };

    match jeffy_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    maps,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        maps,
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
