//! Database operations for `categories` and `products`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product joined with its category slug.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub public_id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub category_slug: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub currency: String,
    pub stock_quantity: i32,
    pub status: String,
    pub image_urls: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "p.id, p.public_id, p.sku, p.name, p.description, p.category_id, \
     c.slug AS category_slug, p.price, p.compare_at_price, p.cost_price, p.currency, \
     p.stock_quantity, p.status, p.image_urls, p.tags, p.created_at, p.updated_at";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProductQuery<'a> {
    pub category_slug: Option<&'a str>,
    /// Case-insensitive substring match on name or SKU.
    pub search: Option<&'a str>,
    pub status: Option<&'a str>,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub currency: String,
    pub stock_quantity: i32,
    pub status: String,
    pub image_urls: Vec<String>,
    pub tags: Vec<String>,
}

/// Sparse product update. Outer `None` keeps the current value; for nullable
/// columns `Some(None)` clears it.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<i64>>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Option<Decimal>>,
    pub cost_price: Option<Option<Decimal>>,
    pub status: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Returns all categories ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, slug, description, created_at, updated_at \
         FROM categories \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a category.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including slug conflicts.
pub async fn create_category(
    pool: &PgPool,
    name: &str,
    slug: &str,
    description: Option<&str>,
) -> Result<CategoryRow, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (name, slug, description) \
         VALUES ($1, $2, $3) \
         RETURNING id, name, slug, description, created_at, updated_at",
    )
    .bind(name)
    .bind(slug)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Lists non-deleted products matching the filter, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    query: &ProductQuery<'_>,
) -> Result<Vec<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id \
         WHERE p.deleted_at IS NULL \
           AND ($1::TEXT IS NULL OR c.slug = $1) \
           AND ($2::TEXT IS NULL OR p.name ILIKE '%' || $2 || '%' OR p.sku ILIKE '%' || $2 || '%') \
           AND ($3::TEXT IS NULL OR p.status = $3) \
         ORDER BY p.name, p.id \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(query.category_slug)
        .bind(query.search)
        .bind(query.status)
        .bind(query.limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches a non-deleted product by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id \
         WHERE p.id = $1 AND p.deleted_at IS NULL"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Fetches an active, non-deleted product by SKU for the storefront.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_active_product_by_sku(
    pool: &PgPool,
    sku: &str,
) -> Result<Option<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id \
         WHERE p.sku = $1 AND p.status = 'active' AND p.deleted_at IS NULL"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(sku)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts a product and returns it joined with its category.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (duplicate SKU, unknown
/// category, check violations).
pub async fn create_product(pool: &PgPool, product: &NewProduct) -> Result<ProductRow, DbError> {
    let sql = format!(
        "WITH p AS ( \
             INSERT INTO products \
               (sku, name, description, category_id, price, compare_at_price, cost_price, \
                currency, stock_quantity, status, image_urls, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING * \
         ) \
         SELECT {PRODUCT_COLUMNS} FROM p LEFT JOIN categories c ON c.id = p.category_id"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(product.cost_price)
        .bind(&product.currency)
        .bind(product.stock_quantity)
        .bind(&product.status)
        .bind(&product.image_urls)
        .bind(&product.tags)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Applies a sparse update. Returns `None` when the product does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_product(
    pool: &PgPool,
    id: i64,
    update: &ProductUpdate,
) -> Result<Option<ProductRow>, DbError> {
    let sql = format!(
        "WITH p AS ( \
             UPDATE products \
             SET name             = COALESCE($2, name), \
                 description      = CASE WHEN $3::BOOL THEN $4 ELSE description END, \
                 category_id      = CASE WHEN $5::BOOL THEN $6 ELSE category_id END, \
                 price            = COALESCE($7, price), \
                 compare_at_price = CASE WHEN $8::BOOL THEN $9 ELSE compare_at_price END, \
                 cost_price       = CASE WHEN $10::BOOL THEN $11 ELSE cost_price END, \
                 status           = COALESCE($12, status), \
                 image_urls       = COALESCE($13, image_urls), \
                 tags             = COALESCE($14, tags), \
                 updated_at       = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING * \
         ) \
         SELECT {PRODUCT_COLUMNS} FROM p LEFT JOIN categories c ON c.id = p.category_id"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(&update.name)
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .bind(update.category_id.is_some())
        .bind(update.category_id.flatten())
        .bind(update.price)
        .bind(update.compare_at_price.is_some())
        .bind(update.compare_at_price.flatten())
        .bind(update.cost_price.is_some())
        .bind(update.cost_price.flatten())
        .bind(&update.status)
        .bind(&update.image_urls)
        .bind(&update.tags)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Soft-deletes a product. Returns `false` if it was already gone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn soft_delete_product(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE products \
         SET deleted_at = NOW(), status = 'archived', updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Adds `delta` (which may be negative) to a product's stock.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown product and
/// [`DbError::InsufficientStock`] when the result would go below zero.
pub async fn adjust_stock(pool: &PgPool, id: i64, delta: i32) -> Result<ProductRow, DbError> {
    let mut tx = pool.begin().await?;

    let current: Option<(String, i32)> = sqlx::query_as(
        "SELECT sku, stock_quantity FROM products \
         WHERE id = $1 AND deleted_at IS NULL \
         FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((sku, stock)) = current else {
        return Err(DbError::NotFound);
    };
    if i64::from(stock) + i64::from(delta) < 0 {
        return Err(DbError::InsufficientStock {
            sku,
            available: stock,
            requested: delta.saturating_neg(),
        });
    }

    sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(delta)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(product_id = id, delta, "stock adjusted");
    get_product(pool, id).await?.ok_or(DbError::NotFound)
}
