use jeffy_core::catalog::CatalogFile;
use jeffy_core::slug_from_name;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

/// Rows upserted per section of the catalog file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub categories: usize,
    pub franchises: usize,
    pub distributors: usize,
}

/// Upsert categories, franchises and distributors from the catalog file,
/// keyed by slug.
///
/// All upserts run inside a single transaction; if any operation fails
/// the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for category in &catalog.categories {
        sqlx::query(
            "INSERT INTO categories (name, slug, description) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 description = EXCLUDED.description, \
                 updated_at = NOW()",
        )
        .bind(&category.name)
        .bind(slug_from_name(&category.name))
        .bind(&category.description)
        .execute(&mut *tx)
        .await?;
        summary.categories += 1;
    }

    for franchise in &catalog.franchises {
        sqlx::query(
            "INSERT INTO franchises (name, slug, city, contact_email) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 city = EXCLUDED.city, \
                 contact_email = EXCLUDED.contact_email, \
                 updated_at = NOW()",
        )
        .bind(&franchise.name)
        .bind(slug_from_name(&franchise.name))
        .bind(&franchise.city)
        .bind(&franchise.contact_email)
        .execute(&mut *tx)
        .await?;
        summary.franchises += 1;
    }

    for distributor in &catalog.distributors {
        sqlx::query(
            "INSERT INTO distributors \
               (name, slug, country, contact_email, contact_phone, lead_time_days, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 country = EXCLUDED.country, \
                 contact_email = EXCLUDED.contact_email, \
                 contact_phone = EXCLUDED.contact_phone, \
                 lead_time_days = EXCLUDED.lead_time_days, \
                 notes = EXCLUDED.notes, \
                 is_active = true, \
                 deleted_at = NULL, \
                 updated_at = NOW()",
        )
        .bind(&distributor.name)
        .bind(slug_from_name(&distributor.name))
        .bind(distributor.country.as_deref().map(str::to_ascii_uppercase))
        .bind(&distributor.contact_email)
        .bind(&distributor.contact_phone)
        .bind(distributor.lead_time_days)
        .bind(&distributor.notes)
        .execute(&mut *tx)
        .await?;
        summary.distributors += 1;
    }

    tx.commit().await?;

    tracing::info!(
        categories = summary.categories,
        franchises = summary.franchises,
        distributors = summary.distributors,
        "catalog seeded"
    );
    Ok(summary)
}
