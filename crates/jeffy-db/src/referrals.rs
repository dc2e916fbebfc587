//! Referral campaigns, codes and redemptions.

use chrono::{DateTime, Utc};
use jeffy_core::referral::{campaign_discount, generate_code, normalize_code, CampaignTerms};
use jeffy_core::ReferralError;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

/// Attempts before giving up on a collision-free generated code.
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub name: String,
    pub code_prefix: String,
    pub reward_kind: String,
    pub reward_value: Decimal,
    pub min_order_total: Decimal,
    pub max_redemptions: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRow {
    /// Converts the stored columns into the rule type used for discounting.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::InvalidTerms`] if `reward_kind` is unknown.
    pub fn terms(&self) -> Result<CampaignTerms, ReferralError> {
        Ok(CampaignTerms {
            reward_kind: self.reward_kind.parse()?,
            reward_value: self.reward_value,
            min_order_total: self.min_order_total,
            max_redemptions: self.max_redemptions,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReferralCodeRow {
    pub id: i64,
    pub campaign_id: i64,
    pub referrer_user_id: Option<i64>,
    pub code: String,
    pub redemption_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub code_prefix: String,
    pub terms: CampaignTerms,
}

/// A discount reserved inside an order transaction, not yet tied to an order.
#[derive(Debug, Clone)]
pub(crate) struct ReservedRedemption {
    pub code_id: i64,
    pub code: String,
    pub discount: Decimal,
}

const CAMPAIGN_COLUMNS: &str = "id, name, code_prefix, reward_kind, reward_value, \
     min_order_total, max_redemptions, starts_at, ends_at, is_active, created_at, updated_at";

const CODE_COLUMNS: &str =
    "id, campaign_id, referrer_user_id, code, redemption_count, created_at";

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

/// Lists campaigns, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_campaigns(pool: &PgPool, active_only: bool) -> Result<Vec<CampaignRow>, DbError> {
    let sql = format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM referral_campaigns \
         WHERE (NOT $1 OR is_active) \
         ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, CampaignRow>(&sql)
        .bind(active_only)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one campaign.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_campaign(pool: &PgPool, id: i64) -> Result<Option<CampaignRow>, DbError> {
    let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM referral_campaigns WHERE id = $1");
    let row = sqlx::query_as::<_, CampaignRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Validates the terms and inserts a campaign.
///
/// # Errors
///
/// Returns [`DbError::Referral`] for invalid terms or [`DbError::Sqlx`] if
/// the insert fails.
pub async fn create_campaign(pool: &PgPool, campaign: &NewCampaign) -> Result<CampaignRow, DbError> {
    campaign.terms.validate()?;

    let sql = format!(
        "INSERT INTO referral_campaigns \
           (name, code_prefix, reward_kind, reward_value, min_order_total, max_redemptions, \
            starts_at, ends_at, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {CAMPAIGN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, CampaignRow>(&sql)
        .bind(&campaign.name)
        .bind(campaign.code_prefix.to_ascii_uppercase())
        .bind(campaign.terms.reward_kind.to_string())
        .bind(campaign.terms.reward_value)
        .bind(campaign.terms.min_order_total)
        .bind(campaign.terms.max_redemptions)
        .bind(campaign.terms.starts_at)
        .bind(campaign.terms.ends_at)
        .bind(campaign.terms.is_active)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Deactivates every active campaign whose window has closed.
///
/// Returns the number of campaigns deactivated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn expire_campaigns(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE referral_campaigns \
         SET is_active = false, updated_at = NOW() \
         WHERE is_active AND ends_at IS NOT NULL AND ends_at <= $1",
    )
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

/// Issues a new code for a campaign, retrying on the rare generated collision.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the campaign does not exist, or
/// [`DbError::Sqlx`] if the insert keeps failing.
pub async fn create_referral_code(
    pool: &PgPool,
    campaign_id: i64,
    referrer_user_id: Option<i64>,
) -> Result<ReferralCodeRow, DbError> {
    let campaign = get_campaign(pool, campaign_id)
        .await?
        .ok_or(DbError::NotFound)?;

    let sql = format!(
        "INSERT INTO referral_codes (campaign_id, referrer_user_id, code) \
         VALUES ($1, $2, $3) \
         RETURNING {CODE_COLUMNS}"
    );

    let mut attempt = 0;
    loop {
        attempt += 1;
        let code = generate_code(&campaign.code_prefix);
        let result = sqlx::query_as::<_, ReferralCodeRow>(&sql)
            .bind(campaign_id)
            .bind(referrer_user_id)
            .bind(&code)
            .fetch_one(pool)
            .await
            .map_err(DbError::from);

        match result {
            Err(e) if e.is_unique_violation() && attempt < CODE_ATTEMPTS => {
                tracing::debug!(%code, attempt, "referral code collision; regenerating");
            }
            other => return other,
        }
    }
}

/// Looks up a code with its campaign.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn find_referral_code(
    pool: &PgPool,
    code: &str,
) -> Result<Option<(ReferralCodeRow, CampaignRow)>, DbError> {
    let sql = format!("SELECT {CODE_COLUMNS} FROM referral_codes WHERE code = $1");
    let Some(code_row) = sqlx::query_as::<_, ReferralCodeRow>(&sql)
        .bind(normalize_code(code))
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let campaign = get_campaign(pool, code_row.campaign_id)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(Some((code_row, campaign)))
}

/// Prices a code against an order total without redeeming it.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an unknown code, [`DbError::Referral`]
/// when the campaign rules reject it, or [`DbError::Sqlx`] if a query fails.
pub async fn quote_referral_discount(
    pool: &PgPool,
    code: &str,
    order_total: Decimal,
    now: DateTime<Utc>,
) -> Result<(ReferralCodeRow, Decimal), DbError> {
    let (code_row, campaign) = find_referral_code(pool, code).await?.ok_or_else(|| {
        DbError::Validation(format!("unknown referral code '{}'", normalize_code(code)))
    })?;
    let redemptions = campaign_redemptions(pool, campaign.id).await?;
    let discount = campaign_discount(&campaign.terms()?, order_total, redemptions, now)?;
    Ok((code_row, discount))
}

/// Redemptions across every code of a campaign; the cap applies to the total.
async fn campaign_redemptions<'e, E>(executor: E, campaign_id: i64) -> Result<i32, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(redemption_count), 0)::BIGINT FROM referral_codes WHERE campaign_id = $1",
    )
    .bind(campaign_id)
    .fetch_one(executor)
    .await?;
    Ok(i32::try_from(total).unwrap_or(i32::MAX))
}

// ---------------------------------------------------------------------------
// Redemptions (called from order placement)
// ---------------------------------------------------------------------------

/// Locks the code, checks the campaign rules and bumps the redemption count.
pub(crate) async fn reserve_redemption(
    tx: &mut Transaction<'_, Postgres>,
    code: &str,
    order_total: Decimal,
    now: DateTime<Utc>,
) -> Result<ReservedRedemption, DbError> {
    let normalized = normalize_code(code);
    let sql = format!("SELECT {CODE_COLUMNS} FROM referral_codes WHERE code = $1 FOR UPDATE");
    let code_row = sqlx::query_as::<_, ReferralCodeRow>(&sql)
        .bind(&normalized)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::Validation(format!("unknown referral code '{normalized}'")))?;

    let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM referral_campaigns WHERE id = $1 FOR UPDATE");
    let campaign = sqlx::query_as::<_, CampaignRow>(&sql)
        .bind(code_row.campaign_id)
        .fetch_one(&mut **tx)
        .await?;

    let redemptions = campaign_redemptions(&mut **tx, campaign.id).await?;
    let discount = campaign_discount(&campaign.terms()?, order_total, redemptions, now)?;

    sqlx::query("UPDATE referral_codes SET redemption_count = redemption_count + 1 WHERE id = $1")
        .bind(code_row.id)
        .execute(&mut **tx)
        .await?;

    Ok(ReservedRedemption {
        code_id: code_row.id,
        code: code_row.code,
        discount,
    })
}

pub(crate) async fn record_redemption(
    tx: &mut Transaction<'_, Postgres>,
    redemption: &ReservedRedemption,
    order_id: i64,
    referred_user_id: Option<i64>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO referral_redemptions \
           (referral_code_id, order_id, referred_user_id, discount_amount) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(redemption.code_id)
    .bind(order_id)
    .bind(referred_user_id)
    .bind(redemption.discount)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Undoes the redemption attached to an order, if any.
pub(crate) async fn release_redemption(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i64,
) -> Result<(), DbError> {
    let code_id: Option<i64> = sqlx::query_scalar(
        "DELETE FROM referral_redemptions WHERE order_id = $1 RETURNING referral_code_id",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(code_id) = code_id {
        sqlx::query(
            "UPDATE referral_codes \
             SET redemption_count = GREATEST(redemption_count - 1, 0) \
             WHERE id = $1",
        )
        .bind(code_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
