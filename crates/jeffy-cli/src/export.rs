//! `export orders|products`: the same CSV the admin download serves.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use jeffy_core::export::render_csv;

/// Sub-commands available under `export`.
#[derive(Debug, Subcommand)]
pub enum ExportCommands {
    /// Orders placed within an optional date range
    Orders {
        /// First day to include (YYYY-MM-DD, UTC)
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Day after the last one to include (YYYY-MM-DD, UTC)
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Every non-deleted product
    Products {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: ExportCommands) -> anyhow::Result<()> {
    match command {
        ExportCommands::Orders {
            since,
            until,
            output,
        } => {
            if let (Some(s), Some(u)) = (since, until) {
                if s >= u {
                    anyhow::bail!("--since ({s}) must be before --until ({u})");
                }
            }
            let rows =
                jeffy_db::list_order_exports(pool, since.map(start_of_day), until.map(start_of_day))
                    .await?;
            tracing::info!(rows = rows.len(), "orders exported");
            write_output(output.as_deref(), &render_csv(&rows))?;
        }
        ExportCommands::Products { output } => {
            let rows = jeffy_db::list_product_exports(pool).await?;
            tracing::info!(rows = rows.len(), "products exported");
            write_output(output.as_deref(), &render_csv(&rows))?;
        }
    }
    Ok(())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn write_output(path: Option<&Path>, body: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, body)
                .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{body}"),
    }
    Ok(())
}
