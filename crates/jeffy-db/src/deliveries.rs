//! Drivers, delivery assignments and driver location pings.

use chrono::{DateTime, Utc};
use jeffy_core::domain::{check_transition, DeliveryStatus, OrderStatus};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DriverRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub full_name: String,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
    pub is_available: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An assignment joined with its order number and driver name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeliveryRow {
    pub id: i64,
    pub order_id: i64,
    pub order_number: String,
    pub driver_id: i64,
    pub driver_name: String,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub eta_seconds: Option<i32>,
    pub distance_meters: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DriverLocationRow {
    pub id: i64,
    pub driver_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Inputs for an ETA lookup: the driver's last ping and the order's address.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeliveryRoute {
    pub delivery_id: i64,
    pub driver_latitude: Option<f64>,
    pub driver_longitude: Option<f64>,
    pub shipping_address: Option<serde_json::Value>,
}

/// Result of a delivery status change, including any order status it
/// advanced as a side effect.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryStatusChange {
    pub delivery: DeliveryRow,
    pub order_status: Option<OrderStatus>,
}

#[derive(Debug, Clone)]
pub struct NewDriver {
    pub user_id: Option<i64>,
    pub full_name: String,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct DriverUpdate {
    pub full_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub vehicle: Option<Option<String>>,
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
}

const DRIVER_COLUMNS: &str =
    "id, user_id, full_name, phone, vehicle, is_available, is_active, created_at, updated_at";

const DELIVERY_SELECT: &str = "SELECT da.id, da.order_id, o.order_number, da.driver_id, \
            d.full_name AS driver_name, da.status, da.assigned_at, da.picked_up_at, \
            da.delivered_at, da.failure_reason, da.eta_seconds, da.distance_meters, da.updated_at \
     FROM delivery_assignments da \
     JOIN orders o ON o.id = da.order_id \
     JOIN drivers d ON d.id = da.driver_id";

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Lists active drivers by name; optionally only those free for a new job.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_drivers(pool: &PgPool, available_only: bool) -> Result<Vec<DriverRow>, DbError> {
    let sql = format!(
        "SELECT {DRIVER_COLUMNS} FROM drivers \
         WHERE is_active AND (NOT $1 OR is_available) \
         ORDER BY full_name, id"
    );
    let rows = sqlx::query_as::<_, DriverRow>(&sql)
        .bind(available_only)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one driver.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_driver(pool: &PgPool, id: i64) -> Result<Option<DriverRow>, DbError> {
    let sql = format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = $1");
    let row = sqlx::query_as::<_, DriverRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts a driver.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_driver(pool: &PgPool, driver: &NewDriver) -> Result<DriverRow, DbError> {
    let sql = format!(
        "INSERT INTO drivers (user_id, full_name, phone, vehicle) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {DRIVER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DriverRow>(&sql)
        .bind(driver.user_id)
        .bind(&driver.full_name)
        .bind(&driver.phone)
        .bind(&driver.vehicle)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Applies a sparse update. Returns `None` when the driver does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_driver(
    pool: &PgPool,
    id: i64,
    update: &DriverUpdate,
) -> Result<Option<DriverRow>, DbError> {
    let sql = format!(
        "UPDATE drivers \
         SET full_name    = COALESCE($2, full_name), \
             phone        = CASE WHEN $3::BOOL THEN $4 ELSE phone END, \
             vehicle      = CASE WHEN $5::BOOL THEN $6 ELSE vehicle END, \
             is_available = COALESCE($7, is_available), \
             is_active    = COALESCE($8, is_active), \
             updated_at   = NOW() \
         WHERE id = $1 \
         RETURNING {DRIVER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DriverRow>(&sql)
        .bind(id)
        .bind(&update.full_name)
        .bind(update.phone.is_some())
        .bind(update.phone.clone().flatten())
        .bind(update.vehicle.is_some())
        .bind(update.vehicle.clone().flatten())
        .bind(update.is_available)
        .bind(update.is_active)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Records a location ping for a driver.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (unknown driver, coordinates
/// out of range).
pub async fn record_driver_location(
    pool: &PgPool,
    driver_id: i64,
    latitude: f64,
    longitude: f64,
    heading: Option<f64>,
) -> Result<DriverLocationRow, DbError> {
    let row = sqlx::query_as::<_, DriverLocationRow>(
        "INSERT INTO driver_locations (driver_id, latitude, longitude, heading) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, driver_id, latitude, longitude, heading, recorded_at",
    )
    .bind(driver_id)
    .bind(latitude)
    .bind(longitude)
    .bind(heading)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns the most recent ping for a driver.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_driver_location(
    pool: &PgPool,
    driver_id: i64,
) -> Result<Option<DriverLocationRow>, DbError> {
    let row = sqlx::query_as::<_, DriverLocationRow>(
        "SELECT id, driver_id, latitude, longitude, heading, recorded_at \
         FROM driver_locations \
         WHERE driver_id = $1 \
         ORDER BY recorded_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(driver_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Deletes pings recorded before `cutoff`, returning how many were removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn prune_driver_locations(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM driver_locations WHERE recorded_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// Lists assignments, most recently assigned first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_deliveries(
    pool: &PgPool,
    status: Option<&str>,
    driver_id: Option<i64>,
    limit: i64,
) -> Result<Vec<DeliveryRow>, DbError> {
    let sql = format!(
        "{DELIVERY_SELECT} \
         WHERE ($1::TEXT IS NULL OR da.status = $1) \
           AND ($2::BIGINT IS NULL OR da.driver_id = $2) \
         ORDER BY da.assigned_at DESC, da.id DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, DeliveryRow>(&sql)
        .bind(status)
        .bind(driver_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one assignment.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_delivery(pool: &PgPool, id: i64) -> Result<Option<DeliveryRow>, DbError> {
    let sql = format!("{DELIVERY_SELECT} WHERE da.id = $1");
    let row = sqlx::query_as::<_, DeliveryRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Assigns a driver to an order and marks the driver busy.
///
/// The order must be `confirmed` or `processing`; an order may have only one
/// open assignment at a time (enforced by a partial unique index).
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order or driver does not exist.
/// - [`DbError::Validation`] if the order is not ready or the driver inactive.
/// - [`DbError::Sqlx`] for database failures, including a unique violation
///   when the order already has an open assignment.
pub async fn assign_delivery(
    pool: &PgPool,
    order_id: i64,
    driver_id: i64,
) -> Result<DeliveryRow, DbError> {
    let mut tx = pool.begin().await?;

    let order_status: String =
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;
    let order_status: OrderStatus = order_status.parse()?;
    if !matches!(order_status, OrderStatus::Confirmed | OrderStatus::Processing) {
        return Err(DbError::Validation(format!(
            "order is {order_status}; only confirmed or processing orders can be assigned"
        )));
    }

    let driver_active: bool =
        sqlx::query_scalar("SELECT is_active FROM drivers WHERE id = $1 FOR UPDATE")
            .bind(driver_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;
    if !driver_active {
        return Err(DbError::Validation(format!("driver {driver_id} is inactive")));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO delivery_assignments (order_id, driver_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(order_id)
    .bind(driver_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE drivers SET is_available = false, updated_at = NOW() WHERE id = $1")
        .bind(driver_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(delivery_id = id, order_id, driver_id, "delivery assigned");
    get_delivery(pool, id).await?.ok_or(DbError::NotFound)
}

/// Advances an assignment through its lifecycle.
///
/// Side effects, all in one transaction:
/// - `picked_up` stamps `picked_up_at` and moves a `confirmed` or
///   `processing` order to `out_for_delivery`.
/// - `delivered` stamps `delivered_at` and moves an `out_for_delivery` order
///   to `delivered`.
/// - `failed` records the reason and returns an `out_for_delivery` order to
///   `processing`, ready for another assignment.
/// - Either terminal state frees the driver.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the assignment does not exist.
/// - [`DbError::Domain`] if the transition is not allowed.
/// - [`DbError::Sqlx`] for database failures.
pub async fn update_delivery_status(
    pool: &PgPool,
    id: i64,
    next: DeliveryStatus,
    failure_reason: Option<&str>,
) -> Result<DeliveryStatusChange, DbError> {
    let mut tx = pool.begin().await?;

    let current: Option<(String, i64, i64)> = sqlx::query_as(
        "SELECT status, order_id, driver_id FROM delivery_assignments WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let (current, order_id, driver_id) = current.ok_or(DbError::NotFound)?;
    let current: DeliveryStatus = current.parse()?;

    check_transition(
        "delivery status",
        current,
        next,
        current.can_transition_to(next),
    )?;

    sqlx::query(
        "UPDATE delivery_assignments \
         SET status         = $2, \
             picked_up_at   = CASE WHEN $2 = 'picked_up' THEN NOW() ELSE picked_up_at END, \
             delivered_at   = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END, \
             failure_reason = CASE WHEN $2 = 'failed' THEN $3 ELSE failure_reason END, \
             updated_at     = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(next.as_str())
    .bind(failure_reason)
    .execute(&mut *tx)
    .await?;

    let order_follow_up: Option<(&[OrderStatus], OrderStatus)> = match next {
        DeliveryStatus::PickedUp => Some((
            &[OrderStatus::Confirmed, OrderStatus::Processing][..],
            OrderStatus::OutForDelivery,
        )),
        DeliveryStatus::Delivered => Some((&[OrderStatus::OutForDelivery][..], OrderStatus::Delivered)),
        // Back in the dispatch queue so it can be reassigned.
        DeliveryStatus::Failed => Some((&[OrderStatus::OutForDelivery][..], OrderStatus::Processing)),
        _ => None,
    };
    let mut order_status = None;
    if let Some((from, to)) = order_follow_up {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_owned()).collect();
        let changed = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = ANY($2)",
        )
        .bind(order_id)
        .bind(&from)
        .bind(to.as_str())
        .execute(&mut *tx)
        .await?;
        if changed.rows_affected() > 0 {
            order_status = Some(to);
        }
    }

    if next.is_terminal() {
        sqlx::query("UPDATE drivers SET is_available = true, updated_at = NOW() WHERE id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(delivery_id = id, from = %current, to = %next, "delivery status changed");
    let delivery = get_delivery(pool, id).await?.ok_or(DbError::NotFound)?;
    Ok(DeliveryStatusChange {
        delivery,
        order_status,
    })
}

/// Stores the latest ETA estimate for an assignment.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_delivery_eta(
    pool: &PgPool,
    id: i64,
    eta_seconds: i32,
    distance_meters: i32,
) -> Result<Option<DeliveryRow>, DbError> {
    let result = sqlx::query(
        "UPDATE delivery_assignments \
         SET eta_seconds = $2, distance_meters = $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(eta_seconds)
    .bind(distance_meters)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_delivery(pool, id).await
}

/// Loads what an ETA lookup needs for one assignment.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_delivery_route(pool: &PgPool, id: i64) -> Result<Option<DeliveryRoute>, DbError> {
    let row = sqlx::query_as::<_, DeliveryRoute>(
        "SELECT da.id AS delivery_id, \
                loc.latitude AS driver_latitude, \
                loc.longitude AS driver_longitude, \
                o.shipping_address \
         FROM delivery_assignments da \
         JOIN orders o ON o.id = da.order_id \
         LEFT JOIN LATERAL ( \
             SELECT latitude, longitude FROM driver_locations \
             WHERE driver_id = da.driver_id \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT 1 \
         ) loc ON true \
         WHERE da.id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
