//! Inbound import shipments used for landed-cost accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShipmentRow {
    pub id: i64,
    pub reference: String,
    pub distributor_id: Option<i64>,
    pub distributor_name: Option<String>,
    pub origin_country: Option<String>,
    pub status: String,
    pub transport_cost: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShipmentItemRow {
    pub id: i64,
    pub shipment_id: i64,
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewShipmentItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewShipment {
    pub reference: String,
    pub distributor_id: Option<i64>,
    pub origin_country: Option<String>,
    pub status: String,
    pub transport_cost: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<NewShipmentItem>,
}

const SHIPMENT_SELECT: &str = "SELECT s.id, s.reference, s.distributor_id, \
            d.name AS distributor_name, s.origin_country, s.status, s.transport_cost, \
            s.shipped_at, s.arrived_at, s.notes, s.created_at \
     FROM shipments s \
     LEFT JOIN distributors d ON d.id = s.distributor_id";

/// Lists shipments, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shipments(pool: &PgPool, limit: i64) -> Result<Vec<ShipmentRow>, DbError> {
    let sql = format!("{SHIPMENT_SELECT} ORDER BY s.created_at DESC, s.id DESC LIMIT $1");
    let rows = sqlx::query_as::<_, ShipmentRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one shipment.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shipment(pool: &PgPool, id: i64) -> Result<Option<ShipmentRow>, DbError> {
    let sql = format!("{SHIPMENT_SELECT} WHERE s.id = $1");
    let row = sqlx::query_as::<_, ShipmentRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns a shipment's items in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shipment_items(
    pool: &PgPool,
    shipment_id: i64,
) -> Result<Vec<ShipmentItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ShipmentItemRow>(
        "SELECT si.id, si.shipment_id, si.product_id, p.sku, p.name, si.quantity, si.unit_cost \
         FROM shipment_items si \
         JOIN products p ON p.id = si.product_id \
         WHERE si.shipment_id = $1 \
         ORDER BY si.id",
    )
    .bind(shipment_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a shipment and its items in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for a shipment without items, or
/// [`DbError::Sqlx`] if any insert fails.
pub async fn create_shipment(pool: &PgPool, shipment: &NewShipment) -> Result<ShipmentRow, DbError> {
    if shipment.items.is_empty() {
        return Err(DbError::Validation(
            "a shipment needs at least one item".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO shipments \
           (reference, distributor_id, origin_country, status, transport_cost, shipped_at, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(&shipment.reference)
    .bind(shipment.distributor_id)
    .bind(&shipment.origin_country)
    .bind(&shipment.status)
    .bind(shipment.transport_cost)
    .bind(shipment.shipped_at)
    .bind(&shipment.notes)
    .fetch_one(&mut *tx)
    .await?;

    for item in &shipment.items {
        sqlx::query(
            "INSERT INTO shipment_items (shipment_id, product_id, quantity, unit_cost) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_cost)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(shipment_id = id, reference = %shipment.reference, "shipment recorded");
    get_shipment(pool, id).await?.ok_or(DbError::NotFound)
}
