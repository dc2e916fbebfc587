//! Landed-cost and selling-price calculator used by the accounting screens.
//!
//! All arithmetic is done in [`Decimal`] so that money never passes through
//! binary floating point. Rates are fractions (`0.2` for 20 %).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::stock::apportion;
use crate::PricingError;

/// Inputs for [`calculate_cost_breakdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostInputs {
    /// Supplier price per unit.
    pub base_cost: Decimal,
    /// Freight charged per unit.
    #[serde(default)]
    pub transport_per_unit: Decimal,
    /// Freight charged for the whole shipment, spread over `shipment_units`.
    #[serde(default)]
    pub shipment_transport_cost: Decimal,
    #[serde(default)]
    pub shipment_units: u32,
    #[serde(default)]
    pub duty_rate: Decimal,
    #[serde(default)]
    pub import_vat_rate: Decimal,
    #[serde(default)]
    pub sales_vat_rate: Decimal,
    #[serde(default)]
    pub corporate_tax_rate: Decimal,
    #[serde(default)]
    pub profit_margin: Decimal,
}

/// Every intermediate figure of the calculation, per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base_cost: Decimal,
    pub transport_per_unit: Decimal,
    pub allocated_transport: Decimal,
    pub subtotal: Decimal,
    pub duty: Decimal,
    pub cost_before_vat: Decimal,
    pub import_vat: Decimal,
    pub total_landed_cost: Decimal,
    pub effective_cost: Decimal,
    pub price_before_vat: Decimal,
    pub selling_price: Decimal,
    pub sales_vat: Decimal,
    pub profit: Decimal,
    pub corporate_tax: Decimal,
    pub net_profit: Decimal,
    pub net_margin: Decimal,
}

impl CostBreakdown {
    /// Rounds money fields to two places and the margin to four.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            base_cost: round_money(self.base_cost),
            transport_per_unit: round_money(self.transport_per_unit),
            allocated_transport: round_money(self.allocated_transport),
            subtotal: round_money(self.subtotal),
            duty: round_money(self.duty),
            cost_before_vat: round_money(self.cost_before_vat),
            import_vat: round_money(self.import_vat),
            total_landed_cost: round_money(self.total_landed_cost),
            effective_cost: round_money(self.effective_cost),
            price_before_vat: round_money(self.price_before_vat),
            selling_price: round_money(self.selling_price),
            sales_vat: round_money(self.sales_vat),
            profit: round_money(self.profit),
            corporate_tax: round_money(self.corporate_tax),
            net_profit: round_money(self.net_profit),
            net_margin: self
                .net_margin
                .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero),
        }
    }
}

/// Rounds to two decimal places, midpoint away from zero.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn invalid(field: &'static str, reason: &str) -> PricingError {
    PricingError::InvalidInput {
        field,
        reason: reason.to_string(),
    }
}

/// Overflow in any step means the inputs were too large to price.
fn checked(field: &'static str, value: Option<Decimal>) -> Result<Decimal, PricingError> {
    value.ok_or_else(|| invalid(field, "is too large"))
}

fn check_non_negative(field: &'static str, value: Decimal) -> Result<(), PricingError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid(field, "must not be negative"));
    }
    Ok(())
}

fn check_rate(field: &'static str, value: Decimal) -> Result<(), PricingError> {
    check_non_negative(field, value)?;
    if value >= Decimal::ONE {
        return Err(invalid(field, "must be below 1 (rates are fractions)"));
    }
    Ok(())
}

fn validate(inputs: &CostInputs) -> Result<(), PricingError> {
    check_non_negative("base_cost", inputs.base_cost)?;
    check_non_negative("transport_per_unit", inputs.transport_per_unit)?;
    check_non_negative("shipment_transport_cost", inputs.shipment_transport_cost)?;
    if !inputs.shipment_transport_cost.is_zero() && inputs.shipment_units == 0 {
        return Err(invalid(
            "shipment_units",
            "must be positive when a shipment transport cost is given",
        ));
    }
    check_rate("duty_rate", inputs.duty_rate)?;
    check_rate("import_vat_rate", inputs.import_vat_rate)?;
    check_rate("sales_vat_rate", inputs.sales_vat_rate)?;
    check_rate("corporate_tax_rate", inputs.corporate_tax_rate)?;
    check_rate("profit_margin", inputs.profit_margin)?;
    Ok(())
}

/// Computes the per-unit landed cost, the selling price that achieves the
/// requested margin, and the resulting profit after corporate tax.
///
/// Import VAT is treated as fully reclaimable, so it is part of the landed
/// cost paid at the border but not of the effective cost used for pricing.
///
/// # Errors
///
/// Returns [`PricingError::InvalidInput`] when a cost is negative, a rate is
/// outside `[0, 1)`, a shipment cost is given without a unit count, or the
/// figures are too large to compute without overflow.
pub fn calculate_cost_breakdown(inputs: &CostInputs) -> Result<CostBreakdown, PricingError> {
    validate(inputs)?;

    let allocated_transport = if inputs.shipment_transport_cost.is_zero() {
        Decimal::ZERO
    } else {
        checked(
            "shipment_transport_cost",
            inputs
                .shipment_transport_cost
                .checked_div(Decimal::from(inputs.shipment_units)),
        )?
    };

    let subtotal = checked(
        "base_cost",
        inputs
            .base_cost
            .checked_add(inputs.transport_per_unit)
            .and_then(|v| v.checked_add(allocated_transport)),
    )?;
    let duty = checked("duty_rate", subtotal.checked_mul(inputs.duty_rate))?;
    let cost_before_vat = checked("duty_rate", subtotal.checked_add(duty))?;
    let import_vat = checked(
        "import_vat_rate",
        cost_before_vat.checked_mul(inputs.import_vat_rate),
    )?;
    let total_landed_cost = checked("import_vat_rate", cost_before_vat.checked_add(import_vat))?;
    let effective_cost = total_landed_cost - import_vat;

    let price_before_vat = checked(
        "profit_margin",
        effective_cost.checked_div(Decimal::ONE - inputs.profit_margin),
    )?;
    let selling_price = checked(
        "sales_vat_rate",
        price_before_vat.checked_div(Decimal::ONE - inputs.sales_vat_rate),
    )?;
    let sales_vat = checked("sales_vat_rate", selling_price.checked_mul(inputs.sales_vat_rate))?;

    let profit = checked(
        "sales_vat_rate",
        selling_price
            .checked_mul(Decimal::ONE - inputs.sales_vat_rate)
            .and_then(|net| net.checked_sub(effective_cost)),
    )?;
    let corporate_tax = if profit > Decimal::ZERO {
        checked(
            "corporate_tax_rate",
            profit.checked_mul(inputs.corporate_tax_rate),
        )?
    } else {
        Decimal::ZERO
    };
    let net_profit = profit - corporate_tax;
    let net_margin = if price_before_vat.is_zero() {
        Decimal::ZERO
    } else {
        checked("profit_margin", net_profit.checked_div(price_before_vat))?
    };

    Ok(CostBreakdown {
        base_cost: inputs.base_cost,
        transport_per_unit: inputs.transport_per_unit,
        allocated_transport,
        subtotal,
        duty,
        cost_before_vat,
        import_vat,
        total_landed_cost,
        effective_cost,
        price_before_vat,
        selling_price,
        sales_vat,
        profit,
        corporate_tax,
        net_profit,
        net_margin,
    })
}

/// Back-solves the gross margin achieved by a VAT-inclusive shelf price.
///
/// # Errors
///
/// Returns [`PricingError::InvalidInput`] when the VAT rate is out of range or
/// the price net of VAT is not positive.
pub fn achieved_margin(
    effective_cost: Decimal,
    selling_price: Decimal,
    sales_vat_rate: Decimal,
) -> Result<Decimal, PricingError> {
    check_non_negative("effective_cost", effective_cost)?;
    check_rate("sales_vat_rate", sales_vat_rate)?;
    let price_before_vat = checked(
        "selling_price",
        selling_price.checked_mul(Decimal::ONE - sales_vat_rate),
    )?;
    if price_before_vat <= Decimal::ZERO {
        return Err(invalid("selling_price", "must be positive"));
    }
    checked(
        "effective_cost",
        price_before_vat
            .checked_sub(effective_cost)
            .and_then(|gross| gross.checked_div(price_before_vat)),
    )
}

/// Splits a shipment's transport cost across its lines in proportion to the
/// quantity on each line.
///
/// Works in whole cents: every line gets its share rounded down and the
/// leftover cents go to the lines with the largest remainders, so the parts
/// always sum to the rounded total.
///
/// # Errors
///
/// Returns [`PricingError::InvalidInput`] if the total is negative or too
/// large to express in cents, or if the total is positive but no line has a
/// quantity.
pub fn allocate_shipment_cost(
    total: Decimal,
    quantities: &[u32],
) -> Result<Vec<Decimal>, PricingError> {
    check_non_negative("shipment_transport_cost", total)?;
    let cents = round_money(total)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|c| c.to_u64())
        .ok_or_else(|| invalid("shipment_transport_cost", "is too large"))?;

    let weights: Vec<u64> = quantities.iter().map(|q| u64::from(*q)).collect();
    if cents > 0 && weights.iter().all(|w| *w == 0) {
        return Err(invalid(
            "quantities",
            "at least one line needs a positive quantity",
        ));
    }

    Ok(apportion(cents, &weights)
        .into_iter()
        .map(|c| Decimal::from(c) / Decimal::ONE_HUNDRED)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(value: i64) -> Decimal {
        Decimal::new(value, 2)
    }

    fn money(units: i64, cents: i64) -> Decimal {
        Decimal::new(units * 100 + cents, 2)
    }

    fn reference_inputs() -> CostInputs {
        CostInputs {
            base_cost: Decimal::ONE_HUNDRED,
            duty_rate: pct(20),
            import_vat_rate: pct(15),
            profit_margin: pct(30),
            ..CostInputs::default()
        }
    }

    #[test]
    fn landed_cost_stacks_duty_then_vat() {
        let b = calculate_cost_breakdown(&reference_inputs()).unwrap();
        // 100 * 1.2 * 1.15
        assert_eq!(b.total_landed_cost, Decimal::from(138));
        assert_eq!(b.duty, Decimal::from(20));
        assert_eq!(b.import_vat, Decimal::from(18));
        assert_eq!(b.effective_cost, Decimal::from(120));
    }

    #[test]
    fn selling_price_hits_requested_margin() {
        let b = calculate_cost_breakdown(&reference_inputs())
            .unwrap()
            .rounded();
        // 120 / 0.7
        assert_eq!(b.price_before_vat, money(171, 43));
        assert_eq!(b.selling_price, money(171, 43));
        assert_eq!(b.profit, money(51, 43));
        assert_eq!(b.corporate_tax, Decimal::ZERO);
        assert_eq!(b.net_margin, Decimal::new(3000, 4));
    }

    #[test]
    fn sales_vat_is_grossed_up_on_top() {
        let inputs = CostInputs {
            sales_vat_rate: pct(20),
            corporate_tax_rate: pct(25),
            ..reference_inputs()
        };
        let b = calculate_cost_breakdown(&inputs).unwrap().rounded();
        // 171.428571 / 0.8
        assert_eq!(b.selling_price, money(214, 29));
        assert_eq!(b.sales_vat, money(42, 86));
        assert_eq!(b.profit, money(51, 43));
        assert_eq!(b.corporate_tax, money(12, 86));
        assert_eq!(b.net_profit, money(38, 57));
        assert_eq!(b.net_margin, Decimal::new(2250, 4));
    }

    #[test]
    fn shipment_transport_is_spread_per_unit() {
        let inputs = CostInputs {
            base_cost: Decimal::from(10),
            transport_per_unit: Decimal::ONE,
            shipment_transport_cost: Decimal::from(50),
            shipment_units: 25,
            ..CostInputs::default()
        };
        let b = calculate_cost_breakdown(&inputs).unwrap();
        assert_eq!(b.allocated_transport, Decimal::from(2));
        assert_eq!(b.subtotal, Decimal::from(13));
        assert_eq!(b.total_landed_cost, Decimal::from(13));
    }

    #[test]
    fn zero_margin_sells_at_cost() {
        let inputs = CostInputs {
            base_cost: Decimal::from(40),
            ..CostInputs::default()
        };
        let b = calculate_cost_breakdown(&inputs).unwrap();
        assert_eq!(b.selling_price, Decimal::from(40));
        assert_eq!(b.profit, Decimal::ZERO);
        assert_eq!(b.corporate_tax, Decimal::ZERO);
        assert_eq!(b.net_margin, Decimal::ZERO);
    }

    #[test]
    fn free_item_has_zero_margin_not_division_error() {
        let b = calculate_cost_breakdown(&CostInputs::default()).unwrap();
        assert_eq!(b.selling_price, Decimal::ZERO);
        assert_eq!(b.net_margin, Decimal::ZERO);
    }

    #[test]
    fn rejects_rate_of_one_or_more() {
        let inputs = CostInputs {
            profit_margin: Decimal::ONE,
            ..reference_inputs()
        };
        let err = calculate_cost_breakdown(&inputs).unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput { field: "profit_margin", .. }));
    }

    #[test]
    fn rejects_negative_cost() {
        let inputs = CostInputs {
            base_cost: Decimal::from(-5),
            ..CostInputs::default()
        };
        let err = calculate_cost_breakdown(&inputs).unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput { field: "base_cost", .. }));
    }

    #[test]
    fn rejects_shipment_cost_without_units() {
        let inputs = CostInputs {
            base_cost: Decimal::ONE,
            shipment_transport_cost: Decimal::from(10),
            ..CostInputs::default()
        };
        let err = calculate_cost_breakdown(&inputs).unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput { field: "shipment_units", .. }));
    }

    #[test]
    fn achieved_margin_inverts_the_calculator() {
        let b = calculate_cost_breakdown(&CostInputs {
            sales_vat_rate: pct(20),
            ..reference_inputs()
        })
        .unwrap();
        let margin = achieved_margin(b.effective_cost, b.selling_price, pct(20)).unwrap();
        assert_eq!(margin.round_dp(4), Decimal::new(3000, 4));
    }

    #[test]
    fn achieved_margin_can_be_negative() {
        let margin = achieved_margin(Decimal::from(120), Decimal::from(100), Decimal::ZERO).unwrap();
        assert_eq!(margin, pct(-20));
    }

    #[test]
    fn achieved_margin_rejects_zero_price() {
        assert!(achieved_margin(Decimal::ONE, Decimal::ZERO, Decimal::ZERO).is_err());
    }

    #[test]
    fn shipment_cost_allocation_sums_exactly() {
        let parts = allocate_shipment_cost(Decimal::from(100), &[1, 1, 1]).unwrap();
        assert_eq!(parts, vec![money(33, 34), money(33, 33), money(33, 33)]);
        let total: Decimal = parts.iter().sum();
        assert_eq!(total, Decimal::from(100));
    }

    #[test]
    fn shipment_cost_allocation_is_proportional() {
        let parts = allocate_shipment_cost(Decimal::from(90), &[10, 20, 0]).unwrap();
        assert_eq!(parts, vec![Decimal::from(30), Decimal::from(60), Decimal::ZERO]);
    }

    #[test]
    fn huge_inputs_are_rejected_instead_of_overflowing() {
        let err = calculate_cost_breakdown(&CostInputs {
            base_cost: Decimal::MAX,
            duty_rate: pct(20),
            profit_margin: pct(99),
            ..CostInputs::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            PricingError::InvalidInput {
                field: "duty_rate",
                reason: "is too large".to_string(),
            }
        );

        // Fits through the landed cost but not the margin gross-up.
        let err = calculate_cost_breakdown(&CostInputs {
            base_cost: Decimal::MAX / Decimal::from(2),
            profit_margin: pct(99),
            ..CostInputs::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            PricingError::InvalidInput { field: "profit_margin", .. }
        ));

        assert!(allocate_shipment_cost(Decimal::MAX, &[1]).is_err());
        assert!(achieved_margin(Decimal::ZERO, Decimal::MAX, Decimal::ZERO).is_ok());
    }

    #[test]
    fn shipment_cost_allocation_needs_quantities() {
        assert!(allocate_shipment_cost(Decimal::from(5), &[0, 0]).is_err());
        let parts = allocate_shipment_cost(Decimal::ZERO, &[0, 0]).unwrap();
        assert_eq!(parts, vec![Decimal::ZERO, Decimal::ZERO]);
    }
}
