use jeffy_core::{AppConfig, DomainError, ReferralError};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/jeffy-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_connections: read_u32("JEFFY_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            min_connections: read_u32("JEFFY_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: read_u64(
                "JEFFY_DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        sku: String,
        available: i32,
        requested: i32,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Referral(#[from] ReferralError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// SQLSTATE of the underlying Postgres error, if any.
    #[must_use]
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some("23505")
    }

    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some("23503")
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` and pool settings from env.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is unset, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    let config = PoolConfig::from_env();
    connect_pool(&database_url, config)
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; count that as zero.
    let applied_before = count_applied_migrations(pool).await;
    MIGRATOR.run(pool).await?;
    let applied_after = count_applied_migrations(pool).await;

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

async fn count_applied_migrations(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

fn read_u32(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}


pub mod catalog;
pub mod deliveries;
pub mod exports;
pub mod orders;
pub mod partners;
pub mod procurement;
pub mod referrals;
pub mod seed;
pub mod shipments;
pub mod stock_orders;
pub mod users;

pub use catalog::{
    adjust_stock, create_category, create_product, get_active_product_by_sku, get_product,
    list_categories, list_products, soft_delete_product, update_product, CategoryRow, NewProduct,
    ProductQuery, ProductRow, ProductUpdate,
};
pub use deliveries::{
    assign_delivery, create_driver, get_delivery, get_delivery_route, get_driver,
    latest_driver_location, list_deliveries, list_drivers, prune_driver_locations,
    record_driver_location, set_delivery_eta, update_delivery_status, update_driver,
    DeliveryRoute, DeliveryRow, DeliveryStatusChange, DriverLocationRow, DriverRow, DriverUpdate,
    NewDriver,
};
pub use exports::{list_order_exports, list_product_exports, OrderExportRow, ProductExportRow};
pub use orders::{
    create_order, get_order, list_order_items, list_orders, order_stats, update_order_status,
    NewOrder, NewOrderLine, OrderItemRow, OrderQuery, OrderRow, OrderStats, StatusCount,
};
pub use partners::{
    create_distributor, create_franchise, deactivate_distributor, get_distributor_by_slug,
    list_distributors, list_franchises, update_distributor, DistributorRow, DistributorUpdate,
    FranchiseRow, NewDistributor,
};
pub use procurement::{
    create_procurement, delete_procurement, list_procurement, update_procurement,
    NewProcurement, ProcurementRow, ProcurementUpdate,
};
pub use referrals::{
    create_campaign, create_referral_code, expire_campaigns, find_referral_code, get_campaign,
    list_campaigns, quote_referral_discount, CampaignRow, NewCampaign, ReferralCodeRow,
};
pub use seed::{seed_catalog, SeedSummary};
pub use shipments::{
    create_shipment, get_shipment, list_shipment_items, list_shipments, NewShipment,
    NewShipmentItem, ShipmentItemRow, ShipmentRow,
};
pub use stock_orders::{
    allocate_stock_orders, create_stock_order, get_stock_order, list_stock_order_items,
    list_stock_orders, update_stock_order_status, AllocationSummary, NewStockOrder,
    NewStockOrderItem, StockOrderItemRow, StockOrderQuery, StockOrderRow,
};
pub use users::{
    add_favorite, clear_cart, create_address, create_user, delete_address, get_cart, get_user,
    list_addresses, list_favorites, list_users, remove_favorite, replace_cart,
    set_address_coordinates, soft_delete_user, update_user, AddressRow, CartLineRow,
    FavoriteRow, NewAddress, NewUser, UserQuery, UserRow, UserUpdate,
};
