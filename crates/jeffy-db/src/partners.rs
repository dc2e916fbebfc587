//! Database operations for `franchises` and `distributors`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FranchiseRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub city: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DistributorRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub lead_time_days: i32,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDistributor {
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub lead_time_days: i32,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct DistributorUpdate {
    pub name: Option<String>,
    pub country: Option<Option<String>>,
    pub contact_email: Option<Option<String>>,
    pub contact_phone: Option<Option<String>>,
    pub lead_time_days: Option<i32>,
    pub notes: Option<Option<String>>,
}

const DISTRIBUTOR_COLUMNS: &str = "id, name, slug, country, contact_email, contact_phone, \
     lead_time_days, notes, is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Franchises
// ---------------------------------------------------------------------------

/// Returns all franchises ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_franchises(pool: &PgPool) -> Result<Vec<FranchiseRow>, DbError> {
    let rows = sqlx::query_as::<_, FranchiseRow>(
        "SELECT id, name, slug, city, contact_email, is_active, created_at, updated_at \
         FROM franchises \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a franchise.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including slug conflicts.
pub async fn create_franchise(
    pool: &PgPool,
    name: &str,
    slug: &str,
    city: Option<&str>,
    contact_email: Option<&str>,
) -> Result<FranchiseRow, DbError> {
    let row = sqlx::query_as::<_, FranchiseRow>(
        "INSERT INTO franchises (name, slug, city, contact_email) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, name, slug, city, contact_email, is_active, created_at, updated_at",
    )
    .bind(name)
    .bind(slug)
    .bind(city)
    .bind(contact_email)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Distributors
// ---------------------------------------------------------------------------

/// Returns active, non-deleted distributors ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_distributors(pool: &PgPool) -> Result<Vec<DistributorRow>, DbError> {
    let sql = format!(
        "SELECT {DISTRIBUTOR_COLUMNS} FROM distributors \
         WHERE deleted_at IS NULL \
         ORDER BY name"
    );
    let rows = sqlx::query_as::<_, DistributorRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns a non-deleted distributor by slug.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_distributor_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<DistributorRow>, DbError> {
    let sql = format!(
        "SELECT {DISTRIBUTOR_COLUMNS} FROM distributors \
         WHERE slug = $1 AND deleted_at IS NULL"
    );
    let row = sqlx::query_as::<_, DistributorRow>(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts a distributor.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including slug conflicts.
pub async fn create_distributor(
    pool: &PgPool,
    distributor: &NewDistributor,
) -> Result<DistributorRow, DbError> {
    let sql = format!(
        "INSERT INTO distributors \
           (name, slug, country, contact_email, contact_phone, lead_time_days, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {DISTRIBUTOR_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DistributorRow>(&sql)
        .bind(&distributor.name)
        .bind(&distributor.slug)
        .bind(&distributor.country)
        .bind(&distributor.contact_email)
        .bind(&distributor.contact_phone)
        .bind(distributor.lead_time_days)
        .bind(&distributor.notes)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Applies a sparse update in a single `UPDATE … RETURNING`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_distributor(
    pool: &PgPool,
    id: i64,
    update: &DistributorUpdate,
) -> Result<Option<DistributorRow>, DbError> {
    let sql = format!(
        "UPDATE distributors \
         SET name           = COALESCE($2, name), \
             country        = CASE WHEN $3::BOOL THEN $4 ELSE country END, \
             contact_email  = CASE WHEN $5::BOOL THEN $6 ELSE contact_email END, \
             contact_phone  = CASE WHEN $7::BOOL THEN $8 ELSE contact_phone END, \
             lead_time_days = COALESCE($9, lead_time_days), \
             notes          = CASE WHEN $10::BOOL THEN $11 ELSE notes END, \
             updated_at     = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {DISTRIBUTOR_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DistributorRow>(&sql)
        .bind(id)
        .bind(&update.name)
        .bind(update.country.is_some())
        .bind(update.country.clone().flatten())
        .bind(update.contact_email.is_some())
        .bind(update.contact_email.clone().flatten())
        .bind(update.contact_phone.is_some())
        .bind(update.contact_phone.clone().flatten())
        .bind(update.lead_time_days)
        .bind(update.notes.is_some())
        .bind(update.notes.clone().flatten())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Soft-deletes a distributor. Returns `false` if it was already gone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_distributor(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE distributors \
         SET is_active = false, deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
