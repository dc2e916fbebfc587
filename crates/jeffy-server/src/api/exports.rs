//! CSV downloads for back-office spreadsheets.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{DateTime, Utc};
use jeffy_core::export::render_csv;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct OrderExportQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/v1/admin/exports/orders.csv
pub(super) async fn export_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OrderExportQuery>,
) -> Result<Response, ApiError> {
    let rid = &req_id.0;
    if let (Some(since), Some(until)) = (query.since, query.until) {
        if since >= until {
            return Err(ApiError::validation(rid, "since must be before until"));
        }
    }

    let rows = jeffy_db::list_order_exports(&state.pool, query.since, query.until)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(rows = rows.len(), "orders exported");

    let filename = format!("orders-{}.csv", Utc::now().format("%Y%m%d"));
    Ok(csv_response(&filename, render_csv(&rows)))
}

/// GET /api/v1/admin/exports/products.csv
pub(super) async fn export_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Response, ApiError> {
    let rows = jeffy_db::list_product_exports(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    tracing::info!(rows = rows.len(), "products exported");

    let filename = format!("products-{}.csv", Utc::now().format("%Y%m%d"));
    Ok(csv_response(&filename, render_csv(&rows)))
}
