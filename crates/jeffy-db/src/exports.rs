//! Flat rows for the CSV exports.

use chrono::{DateTime, Utc};
use jeffy_core::export::{opt_field, CsvRecord};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderExportRow {
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub customer_email: Option<String>,
    pub franchise: Option<String>,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub referral_code: Option<String>,
}

impl CsvRecord for OrderExportRow {
    const HEADERS: &'static [&'static str] = &[
        "order_number",
        "created_at",
        "status",
        "customer_email",
        "franchise",
        "item_count",
        "subtotal",
        "discount_total",
        "delivery_fee",
        "total",
        "currency",
        "referral_code",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.order_number.clone(),
            self.created_at.to_rfc3339(),
            self.status.clone(),
            opt_field(self.customer_email.as_ref()),
            opt_field(self.franchise.as_ref()),
            self.item_count.to_string(),
            self.subtotal.to_string(),
            self.discount_total.to_string(),
            self.delivery_fee.to_string(),
            self.total.to_string(),
            self.currency.clone(),
            opt_field(self.referral_code.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductExportRow {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub status: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub currency: String,
    pub stock_quantity: i32,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl CsvRecord for ProductExportRow {
    const HEADERS: &'static [&'static str] = &[
        "sku",
        "name",
        "category",
        "status",
        "price",
        "compare_at_price",
        "cost_price",
        "currency",
        "stock_quantity",
        "tags",
        "updated_at",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.sku.clone(),
            self.name.clone(),
            opt_field(self.category.as_ref()),
            self.status.clone(),
            self.price.to_string(),
            opt_field(self.compare_at_price.as_ref()),
            opt_field(self.cost_price.as_ref()),
            self.currency.clone(),
            self.stock_quantity.to_string(),
            self.tags.join(";"),
            self.updated_at.to_rfc3339(),
        ]
    }
}

/// Orders created in `[since, until)`, oldest first. Open bounds are allowed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_exports(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<Vec<OrderExportRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderExportRow>(
        "SELECT o.order_number, o.created_at, o.status, u.email AS customer_email, \
                f.name AS franchise, \
                (SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM order_items WHERE order_id = o.id) \
                    AS item_count, \
                o.subtotal, o.discount_total, o.delivery_fee, o.total, o.currency, o.referral_code \
         FROM orders o \
         LEFT JOIN user_profiles u ON u.id = o.user_id \
         LEFT JOIN franchises f ON f.id = o.franchise_id \
         WHERE ($1::TIMESTAMPTZ IS NULL OR o.created_at >= $1) \
           AND ($2::TIMESTAMPTZ IS NULL OR o.created_at < $2) \
         ORDER BY o.created_at, o.id",
    )
    .bind(since)
    .bind(until)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All non-deleted products, by SKU.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_exports(pool: &PgPool) -> Result<Vec<ProductExportRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductExportRow>(
        "SELECT p.sku, p.name, c.name AS category, p.status, p.price, p.compare_at_price, \
                p.cost_price, p.currency, p.stock_quantity, p.tags, p.updated_at \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id \
         WHERE p.deleted_at IS NULL \
         ORDER BY p.sku",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
