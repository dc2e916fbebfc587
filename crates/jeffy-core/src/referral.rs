//! Referral campaign rules: who gets what discount, and when.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::round_money;
use crate::ReferralError;

/// Characters used in generated codes; omits 0/O and 1/I/L.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Percent,
    Fixed,
}

impl std::fmt::Display for RewardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardKind::Percent => write!(f, "percent"),
            RewardKind::Fixed => write!(f, "fixed"),
        }
    }
}

impl std::str::FromStr for RewardKind {
    type Err = ReferralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(RewardKind::Percent),
            "fixed" => Ok(RewardKind::Fixed),
            other => Err(ReferralError::InvalidTerms(format!(
                "reward_kind must be 'percent' or 'fixed', got '{other}'"
            ))),
        }
    }
}

/// The subset of a campaign row that decides eligibility and reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTerms {
    pub reward_kind: RewardKind,
    /// Percentage points for `Percent`, currency amount for `Fixed`.
    pub reward_value: Decimal,
    pub min_order_total: Decimal,
    pub max_redemptions: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CampaignTerms {
    /// Checks the static shape of the terms, independent of any order.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::InvalidTerms`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ReferralError> {
        if self.reward_value <= Decimal::ZERO {
            return Err(ReferralError::InvalidTerms(
                "reward_value must be positive".to_string(),
            ));
        }
        if self.reward_kind == RewardKind::Percent && self.reward_value > Decimal::ONE_HUNDRED {
            return Err(ReferralError::InvalidTerms(
                "percent reward_value must be at most 100".to_string(),
            ));
        }
        if self.min_order_total < Decimal::ZERO {
            return Err(ReferralError::InvalidTerms(
                "min_order_total must not be negative".to_string(),
            ));
        }
        if matches!(self.max_redemptions, Some(n) if n <= 0) {
            return Err(ReferralError::InvalidTerms(
                "max_redemptions must be positive when set".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                return Err(ReferralError::InvalidTerms(
                    "ends_at must be after starts_at".to_string(),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| now >= end)
    }
}

/// Computes the discount a referral code grants on an order.
///
/// # Errors
///
/// Returns the [`ReferralError`] variant naming why the code cannot be used.
pub fn campaign_discount(
    terms: &CampaignTerms,
    order_total: Decimal,
    redemptions_so_far: i32,
    now: DateTime<Utc>,
) -> Result<Decimal, ReferralError> {
    if !terms.is_active {
        return Err(ReferralError::Inactive);
    }
    if terms.starts_at.is_some_and(|start| now < start) {
        return Err(ReferralError::NotStarted);
    }
    if terms.is_expired(now) {
        return Err(ReferralError::Expired);
    }
    if order_total < terms.min_order_total {
        return Err(ReferralError::BelowMinimum {
            minimum: terms.min_order_total,
        });
    }
    if terms
        .max_redemptions
        .is_some_and(|max| redemptions_so_far >= max)
    {
        return Err(ReferralError::Exhausted);
    }

    let discount = match terms.reward_kind {
        RewardKind::Percent => round_money(order_total * terms.reward_value / Decimal::ONE_HUNDRED),
        RewardKind::Fixed => terms.reward_value,
    };
    Ok(discount.min(order_total))
}

/// Generates a code of the form `PREFIX-XXXXXX`.
///
/// The prefix is upper-cased and stripped to ASCII alphanumerics; an empty
/// prefix yields `JEFFY-XXXXXX`.
#[must_use]
pub fn generate_code(prefix: &str) -> String {
    let mut clean: String = prefix
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if clean.is_empty() {
        clean.push_str("JEFFY");
    }

    format!("{clean}-{}", random_suffix(CODE_SUFFIX_LEN))
}

/// Random string drawn from the unambiguous code alphabet.
pub(crate) fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Normalizes a user-typed code for lookup.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn terms(kind: RewardKind, value: i64) -> CampaignTerms {
        CampaignTerms {
            reward_kind: kind,
            reward_value: Decimal::from(value),
            min_order_total: Decimal::from(20),
            max_redemptions: Some(3),
            starts_at: None,
            ends_at: None,
            is_active: true,
        }
    }

    #[test]
    fn percent_discount_is_rounded() {
        let t = terms(RewardKind::Percent, 15);
        let d = campaign_discount(&t, Decimal::new(3333, 2), 0, Utc::now()).unwrap();
        // 33.33 * 0.15 = 4.9995
        assert_eq!(d, Decimal::new(500, 2));
    }

    #[test]
    fn fixed_discount_capped_at_order_total() {
        let mut t = terms(RewardKind::Fixed, 50);
        t.min_order_total = Decimal::ZERO;
        let d = campaign_discount(&t, Decimal::from(30), 0, Utc::now()).unwrap();
        assert_eq!(d, Decimal::from(30));
    }

    #[test]
    fn below_minimum_is_rejected() {
        let t = terms(RewardKind::Fixed, 5);
        let err = campaign_discount(&t, Decimal::from(19), 0, Utc::now()).unwrap_err();
        assert!(matches!(err, ReferralError::BelowMinimum { .. }));
    }

    #[test]
    fn exhausted_campaign_is_rejected() {
        let t = terms(RewardKind::Fixed, 5);
        let err = campaign_discount(&t, Decimal::from(50), 3, Utc::now()).unwrap_err();
        assert!(matches!(err, ReferralError::Exhausted));
    }

    #[test]
    fn window_is_enforced() {
        let now = Utc::now();
        let mut t = terms(RewardKind::Fixed, 5);
        t.starts_at = Some(now + Duration::hours(1));
        assert!(matches!(
            campaign_discount(&t, Decimal::from(50), 0, now),
            Err(ReferralError::NotStarted)
        ));

        t.starts_at = Some(now - Duration::days(2));
        t.ends_at = Some(now - Duration::days(1));
        assert!(matches!(
            campaign_discount(&t, Decimal::from(50), 0, now),
            Err(ReferralError::Expired)
        ));
        assert!(t.is_expired(now));
    }

    #[test]
    fn inactive_campaign_is_rejected_first() {
        let mut t = terms(RewardKind::Fixed, 5);
        t.is_active = false;
        assert!(matches!(
            campaign_discount(&t, Decimal::ZERO, 99, Utc::now()),
            Err(ReferralError::Inactive)
        ));
    }

    #[test]
    fn validate_rejects_bad_terms() {
        assert!(terms(RewardKind::Percent, 101).validate().is_err());
        assert!(terms(RewardKind::Fixed, 0).validate().is_err());
        let mut t = terms(RewardKind::Fixed, 5);
        t.max_redemptions = Some(0);
        assert!(t.validate().is_err());
        let now = Utc::now();
        let mut t = terms(RewardKind::Fixed, 5);
        t.starts_at = Some(now);
        t.ends_at = Some(now);
        assert!(t.validate().is_err());
        assert!(terms(RewardKind::Percent, 100).validate().is_ok());
    }

    #[test]
    fn generated_codes_have_prefix_and_safe_alphabet() {
        let code = generate_code("summer-24!");
        let (prefix, suffix) = code.split_once('-').expect("dash");
        assert_eq!(prefix, "SUMMER24");
        assert_eq!(suffix.len(), CODE_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn empty_prefix_falls_back() {
        assert!(generate_code("  ").starts_with("JEFFY-"));
    }

    #[test]
    fn reward_kind_parses() {
        assert_eq!("percent".parse::<RewardKind>().unwrap(), RewardKind::Percent);
        assert!("bogus".parse::<RewardKind>().is_err());
    }

    #[test]
    fn normalize_code_trims_and_uppercases() {
        assert_eq!(normalize_code("  summer-abc123 "), "SUMMER-ABC123");
    }
}
