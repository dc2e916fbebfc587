//! Customer orders: placement, status lifecycle and dashboard statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use jeffy_core::domain::{check_transition, reference_number, OrderStatus};
use jeffy_core::pricing::round_money;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::referrals;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub order_number: String,
    pub user_id: Option<i64>,
    pub franchise_id: Option<i64>,
    pub status: String,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub shipping_address: Option<serde_json::Value>,
    pub referral_code: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub total_orders: i64,
    /// Sum of `total` over orders that were not cancelled.
    pub revenue: Decimal,
    pub average_order_value: Decimal,
    pub by_status: Vec<StatusCount>,
}

const ORDER_COLUMNS: &str = "id, public_id, order_number, user_id, franchise_id, status, \
     subtotal, discount_total, delivery_fee, total, currency, shipping_address, referral_code, \
     notes, created_at, updated_at";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct OrderQuery<'a> {
    pub status: Option<&'a str>,
    pub user_id: Option<i64>,
    pub franchise_id: Option<i64>,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<i64>,
    pub franchise_id: Option<i64>,
    pub currency: String,
    pub delivery_fee: Decimal,
    pub shipping_address: Option<serde_json::Value>,
    pub referral_code: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderLine>,
}

struct PricedLine {
    product_id: i64,
    sku: String,
    name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Lists orders newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(pool: &PgPool, query: &OrderQuery<'_>) -> Result<Vec<OrderRow>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE ($1::TEXT IS NULL OR status = $1) \
           AND ($2::BIGINT IS NULL OR user_id = $2) \
           AND ($3::BIGINT IS NULL OR franchise_id = $3) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(query.status)
        .bind(query.user_id)
        .bind(query.franchise_id)
        .bind(query.limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, id: i64) -> Result<Option<OrderRow>, DbError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns the line items of an order in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_items(pool: &PgPool, order_id: i64) -> Result<Vec<OrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, product_id, sku, name, unit_price, quantity, line_total \
         FROM order_items \
         WHERE order_id = $1 \
         ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Validates quantities and folds repeated products into one line, sorted by
/// product id.
fn merge_lines(items: &[NewOrderLine]) -> Result<Vec<NewOrderLine>, DbError> {
    let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(DbError::Validation(format!(
                "quantity for product {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
        let quantity = merged.entry(item.product_id).or_insert(0);
        *quantity = quantity.checked_add(item.quantity).ok_or_else(|| {
            DbError::Validation(format!("quantity for product {} is too large", item.product_id))
        })?;
    }
    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| NewOrderLine {
            product_id,
            quantity,
        })
        .collect())
}

/// Places an order.
///
/// In one transaction: locks and prices every product (lines for the same
/// product are merged, items come back ordered by product id), decrements stock,
/// applies the referral code if one was given, inserts the order with its
/// items and records the redemption. Line prices are snapshotted so later
/// catalog edits do not change historical orders.
///
/// # Errors
///
/// - [`DbError::Validation`] for empty orders, bad quantities, unknown or
///   inactive products.
/// - [`DbError::InsufficientStock`] when a line cannot be filled.
/// - [`DbError::Referral`] when the referral code does not apply.
/// - [`DbError::Sqlx`] for database failures.
pub async fn create_order(
    pool: &PgPool,
    order: &NewOrder,
    now: DateTime<Utc>,
) -> Result<(OrderRow, Vec<OrderItemRow>), DbError> {
    if order.items.is_empty() {
        return Err(DbError::Validation(
            "an order needs at least one item".to_string(),
        ));
    }
    if order.delivery_fee < Decimal::ZERO {
        return Err(DbError::Validation(
            "delivery_fee must not be negative".to_string(),
        ));
    }

    let wanted = merge_lines(&order.items)?;

    let mut tx = pool.begin().await?;

    let mut lines = Vec::with_capacity(wanted.len());
    let mut subtotal = Decimal::ZERO;

    // Ascending product id, so concurrent orders take row locks in the same order.
    for item in &wanted {
        let product: Option<(String, String, Decimal, i32, String)> = sqlx::query_as(
            "SELECT sku, name, price, stock_quantity, status FROM products \
             WHERE id = $1 AND deleted_at IS NULL \
             FOR UPDATE",
        )
        .bind(item.product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((sku, name, price, stock, status)) = product else {
            return Err(DbError::Validation(format!(
                "product {} does not exist",
                item.product_id
            )));
        };
        if status != "active" {
            return Err(DbError::Validation(format!(
                "product {sku} is not available for sale"
            )));
        }
        if stock < item.quantity {
            return Err(DbError::InsufficientStock {
                sku,
                available: stock,
                requested: item.quantity,
            });
        }

        sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;

        let line_total = price * Decimal::from(item.quantity);
        subtotal += line_total;
        lines.push(PricedLine {
            product_id: item.product_id,
            sku,
            name,
            unit_price: price,
            quantity: item.quantity,
            line_total,
        });
    }

    let redemption = match order.referral_code.as_deref() {
        Some(code) => Some(referrals::reserve_redemption(&mut tx, code, subtotal, now).await?),
        None => None,
    };
    let discount_total = redemption.as_ref().map_or(Decimal::ZERO, |r| r.discount);
    let total = round_money(subtotal - discount_total + order.delivery_fee);

    let sql = format!(
        "INSERT INTO orders \
           (order_number, user_id, franchise_id, subtotal, discount_total, delivery_fee, total, \
            currency, shipping_address, referral_code, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {ORDER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(reference_number("JF", now))
        .bind(order.user_id)
        .bind(order.franchise_id)
        .bind(subtotal)
        .bind(discount_total)
        .bind(order.delivery_fee)
        .bind(total)
        .bind(&order.currency)
        .bind(&order.shipping_address)
        .bind(redemption.as_ref().map(|r| r.code.as_str()))
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = sqlx::query_as::<_, OrderItemRow>(
            "INSERT INTO order_items (order_id, product_id, sku, name, unit_price, quantity, line_total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, order_id, product_id, sku, name, unit_price, quantity, line_total",
        )
        .bind(row.id)
        .bind(line.product_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.line_total)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    if let Some(redemption) = &redemption {
        referrals::record_redemption(&mut tx, redemption, row.id, order.user_id).await?;
    }

    tx.commit().await?;

    tracing::info!(
        order_id = row.id,
        order_number = %row.order_number,
        total = %row.total,
        lines = items.len(),
        "order created"
    );
    Ok((row, items))
}

/// Moves an order to `next`, enforcing the lifecycle.
///
/// Cancelling returns the reserved stock to the catalog and releases any
/// referral redemption.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order does not exist.
/// - [`DbError::Domain`] if the transition is not allowed.
/// - [`DbError::Sqlx`] for database failures.
pub async fn update_order_status(
    pool: &PgPool,
    id: i64,
    next: OrderStatus,
) -> Result<OrderRow, DbError> {
    let mut tx = pool.begin().await?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let current: OrderStatus = current.ok_or(DbError::NotFound)?.parse()?;

    check_transition("order status", current, next, current.can_transition_to(next))?;

    if next == OrderStatus::Cancelled {
        sqlx::query(
            "UPDATE products p \
             SET stock_quantity = p.stock_quantity + oi.qty, updated_at = NOW() \
             FROM ( \
                 SELECT product_id, SUM(quantity)::INTEGER AS qty \
                 FROM order_items \
                 WHERE order_id = $1 AND product_id IS NOT NULL \
                 GROUP BY product_id \
             ) oi \
             WHERE p.id = oi.product_id",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        referrals::release_redemption(&mut tx, id).await?;
    }

    let sql = format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(order_id = id, from = %current, to = %next, "order status changed");
    Ok(row)
}

/// Aggregates order counts and revenue, optionally since a point in time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn order_stats(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
) -> Result<OrderStats, DbError> {
    let by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count, COALESCE(SUM(total), 0) AS total \
         FROM orders \
         WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1) \
         GROUP BY status \
         ORDER BY status",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(summarize_stats(by_status))
}

fn summarize_stats(by_status: Vec<StatusCount>) -> OrderStats {
    let total_orders = by_status.iter().map(|s| s.count).sum();
    let (billable_count, revenue) = by_status
        .iter()
        .filter(|s| s.status != OrderStatus::Cancelled.as_str())
        .fold((0_i64, Decimal::ZERO), |(n, sum), s| (n + s.count, sum + s.total));
    let average_order_value = if billable_count == 0 {
        Decimal::ZERO
    } else {
        round_money(revenue / Decimal::from(billable_count))
    };

    OrderStats {
        total_orders,
        revenue,
        average_order_value,
        by_status,
    }
}
