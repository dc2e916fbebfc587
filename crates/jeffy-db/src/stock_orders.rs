//! Franchise stock orders and allocation of central stock to them.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use jeffy_core::domain::{check_transition, reference_number, StockOrderStatus};
use jeffy_core::stock::{allocate_stock, StockRequest};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockOrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub order_number: String,
    pub franchise_id: i64,
    pub franchise_name: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockOrderItemRow {
    pub id: i64,
    pub stock_order_id: i64,
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub requested_quantity: i32,
    pub allocated_quantity: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AllocationSummary {
    /// Stock orders moved to `allocated`.
    pub orders_allocated: usize,
    /// Total units taken from central stock.
    pub units_allocated: i64,
    /// Units requested by the allocated orders but not covered.
    pub units_short: i64,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StockOrderQuery<'a> {
    pub status: Option<&'a str>,
    pub franchise_id: Option<i64>,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct NewStockOrderItem {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewStockOrder {
    pub franchise_id: i64,
    pub notes: Option<String>,
    /// `true` submits immediately; `false` keeps the order as a draft.
    pub submit: bool,
    pub items: Vec<NewStockOrderItem>,
}

#[derive(Debug, sqlx::FromRow)]
struct PendingItem {
    id: i64,
    stock_order_id: i64,
    product_id: i64,
    requested_quantity: i32,
}

const STOCK_ORDER_SELECT: &str = "SELECT so.id, so.public_id, so.order_number, so.franchise_id, \
            f.name AS franchise_name, so.status, so.notes, so.created_at, so.updated_at \
     FROM stock_orders so \
     JOIN franchises f ON f.id = so.franchise_id";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Lists stock orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stock_orders(
    pool: &PgPool,
    query: &StockOrderQuery<'_>,
) -> Result<Vec<StockOrderRow>, DbError> {
    let sql = format!(
        "{STOCK_ORDER_SELECT} \
         WHERE ($1::TEXT IS NULL OR so.status = $1) \
           AND ($2::BIGINT IS NULL OR so.franchise_id = $2) \
         ORDER BY so.created_at DESC, so.id DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, StockOrderRow>(&sql)
        .bind(query.status)
        .bind(query.franchise_id)
        .bind(query.limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one stock order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_stock_order(pool: &PgPool, id: i64) -> Result<Option<StockOrderRow>, DbError> {
    let sql = format!("{STOCK_ORDER_SELECT} WHERE so.id = $1");
    let row = sqlx::query_as::<_, StockOrderRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns the items of a stock order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stock_order_items(
    pool: &PgPool,
    stock_order_id: i64,
) -> Result<Vec<StockOrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, StockOrderItemRow>(
        "SELECT i.id, i.stock_order_id, i.product_id, p.sku, p.name, \
                i.requested_quantity, i.allocated_quantity \
         FROM stock_order_items i \
         JOIN products p ON p.id = i.product_id \
         WHERE i.stock_order_id = $1 \
         ORDER BY i.id",
    )
    .bind(stock_order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Creates a stock order with its items.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for empty orders, bad quantities or a
/// product listed twice, or [`DbError::Sqlx`] if an insert fails.
pub async fn create_stock_order(
    pool: &PgPool,
    order: &NewStockOrder,
    now: DateTime<Utc>,
) -> Result<StockOrderRow, DbError> {
    if order.items.is_empty() {
        return Err(DbError::Validation(
            "a stock order needs at least one item".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for item in &order.items {
        if item.quantity <= 0 {
            return Err(DbError::Validation(format!(
                "quantity for product {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
        if !seen.insert(item.product_id) {
            return Err(DbError::Validation(format!(
                "product {} is listed more than once",
                item.product_id
            )));
        }
    }

    let status = if order.submit {
        StockOrderStatus::Submitted
    } else {
        StockOrderStatus::Draft
    };

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO stock_orders (order_number, franchise_id, status, notes) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(reference_number("SO", now))
    .bind(order.franchise_id)
    .bind(status.as_str())
    .bind(&order.notes)
    .fetch_one(&mut *tx)
    .await?;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO stock_order_items (stock_order_id, product_id, requested_quantity) \
             VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(stock_order_id = id, franchise_id = order.franchise_id, %status, "stock order created");
    get_stock_order(pool, id).await?.ok_or(DbError::NotFound)
}

/// Allocates central stock to submitted stock orders.
///
/// For every product involved, current stock is split across *all* submitted
/// requests for that product (every franchise competes), using proportional
/// largest-remainder allocation. Only the orders in `targets` receive their
/// share and move to `allocated`; pass `None` to allocate every submitted
/// order at once.
///
/// # Errors
///
/// - [`DbError::NotFound`] if a targeted order does not exist.
/// - [`DbError::Domain`] if a targeted order is not `submitted`.
/// - [`DbError::Sqlx`] for database failures.
pub async fn allocate_stock_orders(
    pool: &PgPool,
    targets: Option<&[i64]>,
) -> Result<AllocationSummary, DbError> {
    let mut tx = pool.begin().await?;

    let submitted: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, status FROM stock_orders \
         WHERE status = 'submitted' OR id = ANY($1) \
         ORDER BY created_at, id \
         FOR UPDATE",
    )
    .bind(targets.unwrap_or(&[]))
    .fetch_all(&mut *tx)
    .await?;

    let target_ids: HashSet<i64> = match targets {
        Some(ids) => {
            for id in ids {
                let (_, status) = submitted
                    .iter()
                    .find(|(order_id, _)| order_id == id)
                    .ok_or(DbError::NotFound)?;
                let status: StockOrderStatus = status.parse()?;
                check_transition(
                    "stock order status",
                    status,
                    StockOrderStatus::Allocated,
                    status.can_transition_to(StockOrderStatus::Allocated),
                )?;
            }
            ids.iter().copied().collect()
        }
        None => submitted.iter().map(|(id, _)| *id).collect(),
    };
    if target_ids.is_empty() {
        return Ok(AllocationSummary::default());
    }

    let competing_ids: Vec<i64> = submitted
        .iter()
        .filter(|(_, status)| status == StockOrderStatus::Submitted.as_str())
        .map(|(id, _)| *id)
        .collect();

    let pending = sqlx::query_as::<_, PendingItem>(
        "SELECT i.id, i.stock_order_id, i.product_id, i.requested_quantity \
         FROM stock_order_items i \
         JOIN stock_orders so ON so.id = i.stock_order_id \
         WHERE i.stock_order_id = ANY($1) \
         ORDER BY so.created_at, so.id, i.id",
    )
    .bind(&competing_ids)
    .fetch_all(&mut *tx)
    .await?;

    let mut by_product: BTreeMap<i64, Vec<&PendingItem>> = BTreeMap::new();
    for item in &pending {
        by_product.entry(item.product_id).or_default().push(item);
    }

    let mut summary = AllocationSummary {
        orders_allocated: target_ids.len(),
        ..AllocationSummary::default()
    };

    for (product_id, items) in by_product {
        if !items.iter().any(|i| target_ids.contains(&i.stock_order_id)) {
            continue;
        }

        let available: i32 =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_one(&mut *tx)
                .await?;

        let requests: Vec<StockRequest> = items
            .iter()
            .map(|i| StockRequest {
                key: i.id,
                requested: u32::try_from(i.requested_quantity).unwrap_or(0),
            })
            .collect();
        let allocations = allocate_stock(u32::try_from(available).unwrap_or(0), &requests);

        let mut taken: i64 = 0;
        for (item, allocation) in items.iter().zip(&allocations) {
            if !target_ids.contains(&item.stock_order_id) {
                continue;
            }
            let allocated = i32::try_from(allocation.allocated).unwrap_or(i32::MAX);
            sqlx::query("UPDATE stock_order_items SET allocated_quantity = $2 WHERE id = $1")
                .bind(item.id)
                .bind(allocated)
                .execute(&mut *tx)
                .await?;
            taken += i64::from(allocated);
            summary.units_short += i64::from(item.requested_quantity - allocated);
        }

        sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(i32::try_from(taken).unwrap_or(i32::MAX))
        .execute(&mut *tx)
        .await?;
        summary.units_allocated += taken;
    }

    let target_vec: Vec<i64> = target_ids.into_iter().collect();
    sqlx::query(
        "UPDATE stock_orders SET status = 'allocated', updated_at = NOW() WHERE id = ANY($1)",
    )
    .bind(&target_vec)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        orders = summary.orders_allocated,
        units = summary.units_allocated,
        short = summary.units_short,
        "stock allocated"
    );
    Ok(summary)
}

/// Moves a stock order through its lifecycle. Cancelling an allocated order
/// returns its allocated units to central stock.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order does not exist.
/// - [`DbError::Domain`] if the transition is not allowed.
/// - [`DbError::Sqlx`] for database failures.
pub async fn update_stock_order_status(
    pool: &PgPool,
    id: i64,
    next: StockOrderStatus,
) -> Result<StockOrderRow, DbError> {
    if next == StockOrderStatus::Allocated {
        allocate_stock_orders(pool, Some(&[id])).await?;
        return get_stock_order(pool, id).await?.ok_or(DbError::NotFound);
    }

    let mut tx = pool.begin().await?;

    let status: String = sqlx::query_scalar("SELECT status FROM stock_orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;
    let current: StockOrderStatus = status.parse()?;

    check_transition(
        "stock order status",
        current,
        next,
        current.can_transition_to(next),
    )?;

    if current == StockOrderStatus::Allocated && next == StockOrderStatus::Cancelled {
        sqlx::query(
            "UPDATE products p \
             SET stock_quantity = p.stock_quantity + i.allocated_quantity, updated_at = NOW() \
             FROM stock_order_items i \
             WHERE i.stock_order_id = $1 AND i.product_id = p.id AND i.allocated_quantity > 0",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE stock_orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(next.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(stock_order_id = id, from = %current, to = %next, "stock order status changed");
    get_stock_order(pool, id).await?.ok_or(DbError::NotFound)
}
