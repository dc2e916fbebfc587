//! User profiles and the per-user storefront tables: saved addresses,
//! favorites and cart.

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
pub struct UserRow {
    pub id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub franchise_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AddressRow {
    pub id: i64,
    pub user_id: i64,
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl AddressRow {
    /// Single-line form suitable for geocoding.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            Some(self.line1.as_str()),
            self.line2.as_deref(),
            Some(self.city.as_str()),
            self.region.as_deref(),
            Some(self.postal_code.as_str()),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FavoriteRow {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLineRow {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub line_total: Decimal,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct UserQuery<'a> {
    pub role: Option<&'a str>,
    /// Case-insensitive substring match on email or full name.
    pub search: Option<&'a str>,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub franchise_id: Option<i64>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub role: Option<String>,
    pub franchise_id: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

const USER_COLUMNS: &str =
    "id, public_id, email, full_name, phone, role, franchise_id, is_active, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, user_id, label, line1, line2, city, region, postal_code, \
     country, latitude, longitude, is_default, created_at";

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Lists non-deleted users, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool, query: &UserQuery<'_>) -> Result<Vec<UserRow>, DbError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM user_profiles \
         WHERE deleted_at IS NULL \
           AND ($1::TEXT IS NULL OR role = $1) \
           AND ($2::TEXT IS NULL OR email ILIKE '%' || $2 || '%' OR full_name ILIKE '%' || $2 || '%') \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, UserRow>(&sql)
        .bind(query.role)
        .bind(query.search)
        .bind(query.limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches a non-deleted user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM user_profiles WHERE id = $1 AND deleted_at IS NULL");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts a user profile.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including duplicate emails.
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<UserRow, DbError> {
    let sql = format!(
        "INSERT INTO user_profiles (email, full_name, phone, role, franchise_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.role)
        .bind(user.franchise_id)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Applies a sparse update. Returns `None` when the user does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_user(
    pool: &PgPool,
    id: i64,
    update: &UserUpdate,
) -> Result<Option<UserRow>, DbError> {
    let sql = format!(
        "UPDATE user_profiles \
         SET full_name    = CASE WHEN $2::BOOL THEN $3 ELSE full_name END, \
             phone        = CASE WHEN $4::BOOL THEN $5 ELSE phone END, \
             role         = COALESCE($6, role), \
             franchise_id = CASE WHEN $7::BOOL THEN $8 ELSE franchise_id END, \
             is_active    = COALESCE($9, is_active), \
             updated_at   = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .bind(update.full_name.is_some())
        .bind(update.full_name.clone().flatten())
        .bind(update.phone.is_some())
        .bind(update.phone.clone().flatten())
        .bind(&update.role)
        .bind(update.franchise_id.is_some())
        .bind(update.franchise_id.flatten())
        .bind(update.is_active)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Soft-deletes a user and deactivates the profile.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn soft_delete_user(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE user_profiles \
         SET is_active = false, deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Saved addresses
// ---------------------------------------------------------------------------

/// Lists a user's addresses, default first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_addresses(pool: &PgPool, user_id: i64) -> Result<Vec<AddressRow>, DbError> {
    let sql = format!(
        "SELECT {ADDRESS_COLUMNS} FROM saved_addresses \
         WHERE user_id = $1 \
         ORDER BY is_default DESC, created_at"
    );
    let rows = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Inserts an address. A new default address clears the previous default in
/// the same transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn create_address(
    pool: &PgPool,
    user_id: i64,
    address: &NewAddress,
) -> Result<AddressRow, DbError> {
    let mut tx = pool.begin().await?;

    if address.is_default {
        sqlx::query("UPDATE saved_addresses SET is_default = false WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    let sql = format!(
        "INSERT INTO saved_addresses \
           (user_id, label, line1, line2, city, region, postal_code, country, is_default) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {ADDRESS_COLUMNS}"
    );
    let row = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(user_id)
        .bind(&address.label)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.region)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}

/// Stores geocoded coordinates for an address.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_address_coordinates(
    pool: &PgPool,
    address_id: i64,
    latitude: f64,
    longitude: f64,
) -> Result<(), DbError> {
    sqlx::query("UPDATE saved_addresses SET latitude = $2, longitude = $3 WHERE id = $1")
        .bind(address_id)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deletes one of a user's addresses. Returns `false` when nothing matched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_address(pool: &PgPool, user_id: i64, address_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM saved_addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

/// Lists a user's favorited products, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_favorites(pool: &PgPool, user_id: i64) -> Result<Vec<FavoriteRow>, DbError> {
    let rows = sqlx::query_as::<_, FavoriteRow>(
        "SELECT p.id AS product_id, p.sku, p.name, p.price, p.currency, p.image_urls, f.created_at \
         FROM favorites f \
         JOIN products p ON p.id = f.product_id \
         WHERE f.user_id = $1 AND p.deleted_at IS NULL \
         ORDER BY f.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Adds a favorite; adding the same product twice is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (unknown user or product).
pub async fn add_favorite(pool: &PgPool, user_id: i64, product_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO favorites (user_id, product_id) VALUES ($1, $2) \
         ON CONFLICT (user_id, product_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Removes a favorite. Returns `false` when it was not present.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn remove_favorite(pool: &PgPool, user_id: i64, product_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// Returns the user's cart priced at current product prices.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_cart(pool: &PgPool, user_id: i64) -> Result<Vec<CartLineRow>, DbError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        "SELECT p.id AS product_id, p.sku, p.name, p.price, p.currency, ci.quantity, \
                p.price * ci.quantity AS line_total \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 AND p.deleted_at IS NULL \
         ORDER BY ci.created_at, p.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Replaces the whole cart with `(product_id, quantity)` lines.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for non-positive quantities, or
/// [`DbError::Sqlx`] if any statement fails.
pub async fn replace_cart(
    pool: &PgPool,
    user_id: i64,
    lines: &[(i64, i32)],
) -> Result<Vec<CartLineRow>, DbError> {
    if let Some((product_id, qty)) = lines.iter().find(|(_, qty)| *qty <= 0) {
        return Err(DbError::Validation(format!(
            "quantity for product {product_id} must be positive, got {qty}"
        )));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for (product_id, quantity) in lines {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    get_cart(pool, user_id).await
}

/// Empties the cart, returning how many lines were removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn clear_cart(pool: &PgPool, user_id: i64) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
