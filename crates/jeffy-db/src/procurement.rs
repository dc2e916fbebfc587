//! The procurement queue: products waiting to be re-ordered from a distributor.

use chrono::{DateTime, Utc};
use jeffy_core::domain::{check_transition, ProcurementStatus};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProcurementRow {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub product_name: String,
    pub distributor_id: Option<i64>,
    pub distributor_name: Option<String>,
    pub quantity: i32,
    pub status: String,
    pub priority: i16,
    pub requested_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProcurement {
    pub product_id: i64,
    pub distributor_id: Option<i64>,
    pub quantity: i32,
    pub priority: i16,
    pub requested_by: Option<String>,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProcurementUpdate {
    pub status: Option<ProcurementStatus>,
    pub quantity: Option<i32>,
    pub priority: Option<i16>,
    pub distributor_id: Option<Option<i64>>,
    pub notes: Option<Option<String>>,
}

const PROCUREMENT_SELECT: &str = "SELECT q.id, q.product_id, p.sku, p.name AS product_name, \
            q.distributor_id, d.name AS distributor_name, q.quantity, q.status, q.priority, \
            q.requested_by, q.notes, q.created_at, q.updated_at \
     FROM procurement_queue q \
     JOIN products p ON p.id = q.product_id \
     LEFT JOIN distributors d ON d.id = q.distributor_id";

/// Lists queue entries, highest priority and oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_procurement(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<ProcurementRow>, DbError> {
    let sql = format!(
        "{PROCUREMENT_SELECT} \
         WHERE ($1::TEXT IS NULL OR q.status = $1) \
         ORDER BY q.priority DESC, q.created_at, q.id \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, ProcurementRow>(&sql)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn get_procurement(pool: &PgPool, id: i64) -> Result<Option<ProcurementRow>, DbError> {
    let sql = format!("{PROCUREMENT_SELECT} WHERE q.id = $1");
    let row = sqlx::query_as::<_, ProcurementRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Queues a product for re-order.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for a non-positive quantity, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_procurement(
    pool: &PgPool,
    entry: &NewProcurement,
) -> Result<ProcurementRow, DbError> {
    if entry.quantity <= 0 {
        return Err(DbError::Validation("quantity must be positive".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO procurement_queue \
           (product_id, distributor_id, quantity, priority, requested_by, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(entry.product_id)
    .bind(entry.distributor_id)
    .bind(entry.quantity)
    .bind(entry.priority)
    .bind(&entry.requested_by)
    .bind(&entry.notes)
    .fetch_one(pool)
    .await?;

    get_procurement(pool, id).await?.ok_or(DbError::NotFound)
}

/// Applies a sparse update. Marking an entry `received` adds its quantity to
/// the product's stock in the same transaction.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the entry does not exist.
/// - [`DbError::Domain`] if the status transition is not allowed.
/// - [`DbError::Validation`] for a non-positive quantity.
/// - [`DbError::Sqlx`] for database failures.
pub async fn update_procurement(
    pool: &PgPool,
    id: i64,
    update: &ProcurementUpdate,
) -> Result<ProcurementRow, DbError> {
    if matches!(update.quantity, Some(q) if q <= 0) {
        return Err(DbError::Validation("quantity must be positive".to_string()));
    }

    let mut tx = pool.begin().await?;

    let current: Option<(String, i64, i32)> = sqlx::query_as(
        "SELECT status, product_id, quantity FROM procurement_queue WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let (status, product_id, quantity) = current.ok_or(DbError::NotFound)?;
    let current: ProcurementStatus = status.parse()?;

    if let Some(next) = update.status {
        check_transition(
            "procurement status",
            current,
            next,
            current.can_transition_to(next),
        )?;
    }

    sqlx::query(
        "UPDATE procurement_queue \
         SET status         = COALESCE($2, status), \
             quantity       = COALESCE($3, quantity), \
             priority       = COALESCE($4, priority), \
             distributor_id = CASE WHEN $5::BOOL THEN $6 ELSE distributor_id END, \
             notes          = CASE WHEN $7::BOOL THEN $8 ELSE notes END, \
             updated_at     = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.status.map(ProcurementStatus::as_str))
    .bind(update.quantity)
    .bind(update.priority)
    .bind(update.distributor_id.is_some())
    .bind(update.distributor_id.flatten())
    .bind(update.notes.is_some())
    .bind(update.notes.clone().flatten())
    .execute(&mut *tx)
    .await?;

    if update.status == Some(ProcurementStatus::Received) {
        let received = update.quantity.unwrap_or(quantity);
        sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(received)
        .execute(&mut *tx)
        .await?;
        tracing::info!(procurement_id = id, product_id, received, "procurement received into stock");
    }

    tx.commit().await?;
    get_procurement(pool, id).await?.ok_or(DbError::NotFound)
}

/// Removes a queue entry that has not been ordered yet.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the entry does not exist.
/// - [`DbError::Validation`] if the entry is already `ordered` or `received`.
/// - [`DbError::Sqlx`] for database failures.
pub async fn delete_procurement(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let status: String =
        sqlx::query_scalar("SELECT status FROM procurement_queue WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;
    let status: ProcurementStatus = status.parse()?;
    if !matches!(status, ProcurementStatus::Queued | ProcurementStatus::Cancelled) {
        return Err(DbError::Validation(format!(
            "cannot delete a procurement entry that is {status}"
        )));
    }

    sqlx::query("DELETE FROM procurement_queue WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
