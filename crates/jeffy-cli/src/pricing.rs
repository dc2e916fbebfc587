//! `pricing calc`: the landed-cost calculator from the admin UI, offline.

use clap::Subcommand;
use jeffy_core::pricing::{achieved_margin, calculate_cost_breakdown, CostBreakdown, CostInputs};
use rust_decimal::Decimal;

/// Sub-commands available under `pricing`.
#[derive(Debug, Subcommand)]
pub enum PricingCommands {
    /// Compute the per-unit landed cost and selling price
    Calc {
        /// Supplier price per unit
        #[arg(long)]
        base_cost: Decimal,
        /// Freight charged per unit
        #[arg(long, default_value = "0")]
        transport_per_unit: Decimal,
        /// Freight for the whole shipment, spread over --shipment-units
        #[arg(long, default_value = "0")]
        shipment_cost: Decimal,
        #[arg(long, default_value = "0")]
        shipment_units: u32,
        /// Rates are fractions: 0.2 for 20%
        #[arg(long, default_value = "0")]
        duty_rate: Decimal,
        #[arg(long, default_value = "0")]
        import_vat_rate: Decimal,
        #[arg(long, default_value = "0")]
        sales_vat_rate: Decimal,
        #[arg(long, default_value = "0")]
        corporate_tax_rate: Decimal,
        /// Target gross margin on the price before VAT
        #[arg(long, default_value = "0")]
        margin: Decimal,
        /// Observed VAT-inclusive shelf price to report the achieved margin for
        #[arg(long)]
        shelf_price: Option<Decimal>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub(crate) fn run(command: &PricingCommands) -> anyhow::Result<()> {
    let PricingCommands::Calc {
        base_cost,
        transport_per_unit,
        shipment_cost,
        shipment_units,
        duty_rate,
        import_vat_rate,
        sales_vat_rate,
        corporate_tax_rate,
        margin,
        shelf_price,
        json,
    } = command;

    let inputs = CostInputs {
        base_cost: *base_cost,
        transport_per_unit: *transport_per_unit,
        shipment_transport_cost: *shipment_cost,
        shipment_units: *shipment_units,
        duty_rate: *duty_rate,
        import_vat_rate: *import_vat_rate,
        sales_vat_rate: *sales_vat_rate,
        corporate_tax_rate: *corporate_tax_rate,
        profit_margin: *margin,
    };
    let breakdown = calculate_cost_breakdown(&inputs)?;
    let shelf_margin = shelf_price
        .map(|price| achieved_margin(breakdown.effective_cost, price, *sales_vat_rate))
        .transpose()?;

    if *json {
        let mut value = serde_json::to_value(breakdown.rounded())?;
        if let Some(m) = shelf_margin {
            value["shelf_price_margin"] = serde_json::Value::String(m.round_dp(4).to_string());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render_breakdown(&breakdown.rounded()));
        if let Some(m) = shelf_margin {
            let percent = m
                .checked_mul(Decimal::ONE_HUNDRED)
                .ok_or_else(|| anyhow::anyhow!("shelf price margin is out of range"))?;
            println!("{:<22}{:>11}%", "shelf price margin", percent.round_dp(2));
        }
    }
    Ok(())
}

/// Two-column table of every figure, in calculation order.
fn render_breakdown(b: &CostBreakdown) -> String {
    let rows: [(&str, Decimal); 16] = [
        ("base cost", b.base_cost),
        ("transport / unit", b.transport_per_unit),
        ("shipment share", b.allocated_transport),
        ("subtotal", b.subtotal),
        ("duty", b.duty),
        ("cost before VAT", b.cost_before_vat),
        ("import VAT", b.import_vat),
        ("total landed cost", b.total_landed_cost),
        ("effective cost", b.effective_cost),
        ("price before VAT", b.price_before_vat),
        ("selling price", b.selling_price),
        ("sales VAT", b.sales_vat),
        ("profit", b.profit),
        ("corporate tax", b.corporate_tax),
        ("net profit", b.net_profit),
        ("net margin", b.net_margin),
    ];
    rows.iter()
        .map(|(label, value)| format!("{label:<22}{value:>12}\n"))
        .collect()
}
