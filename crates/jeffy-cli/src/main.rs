mod deliveries;
mod export;
mod pricing;

use clap::{Parser, Subcommand};

use crate::deliveries::DeliveriesCommands;
use crate::export::ExportCommands;
use crate::pricing::PricingCommands;

#[derive(Debug, Parser)]
#[command(name = "jeffy-cli")]
#[command(about = "Jeffy operations command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Landed cost and selling price calculator
    Pricing {
        #[command(subcommand)]
        command: PricingCommands,
    },
    /// CSV exports for orders and products
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Delivery routing via Google Maps
    Deliveries {
        #[command(subcommand)]
        command: DeliveriesCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert categories, franchises and distributors from the catalog file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Db { command }) => run_db(command).await?,
        // Pure calculation: needs neither config nor a database.
        Some(Commands::Pricing { command }) => pricing::run(&command)?,
        Some(Commands::Export { command }) => {
            let (_, pool) = connect().await?;
            export::run(&pool, command).await?;
        }
        Some(Commands::Deliveries { command }) => {
            let (config, pool) = connect().await?;
            deliveries::run(&config, &pool, command).await?;
        }
        None => {
            println!("jeffy-cli: pass --help to list commands");
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<(jeffy_core::AppConfig, sqlx::PgPool)> {
    let config = jeffy_core::load_app_config()?;
    let pool_config = jeffy_db::PoolConfig::from_app_config(&config);
    let pool = jeffy_db::connect_pool(&config.database_url, pool_config).await?;
    Ok((config, pool))
}

async fn run_db(command: DbCommands) -> anyhow::Result<()> {
    let (config, pool) = connect().await?;
    match command {
        DbCommands::Ping => {
            jeffy_db::ping(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = jeffy_db::run_migrations(&pool).await?;
            println!("migrations up to date ({applied} applied)");
        }
        DbCommands::Seed => {
            let catalog = jeffy_core::load_catalog(&config.catalog_path)?;
            let summary = jeffy_db::seed_catalog(&pool, &catalog).await?;
            println!(
                "seeded {} categories, {} franchises, {} distributors from {}",
                summary.categories,
                summary.franchises,
                summary.distributors,
                config.catalog_path.display()
            );
        }
    }
    Ok(())
}
