//! Offline unit tests for jeffy-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::{TimeZone, Utc};
use jeffy_core::export::{render_csv, CsvRecord};
use jeffy_core::{AppConfig, Environment};
use jeffy_db::{AddressRow, OrderExportRow, PoolConfig, ProductExportRow};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        catalog_path: PathBuf::from("./config/catalog.yaml"),
        api_key_hash_salt: "salt".to_string(),
        default_currency: "GBP".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        maps_api_key: None,
        maps_timeout_secs: 15,
        maps_max_retries: 3,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn order_export_row_matches_headers() {
    let row = OrderExportRow {
        order_number: "JF-20260301-ABC234".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        status: "delivered".to_string(),
        customer_email: Some("amira@example.com".to_string()),
        franchise: None,
        item_count: 3,
        subtotal: Decimal::new(4500, 2),
        discount_total: Decimal::new(450, 2),
        delivery_fee: Decimal::new(399, 2),
        total: Decimal::new(4449, 2),
        currency: "GBP".to_string(),
        referral_code: Some("SPRING-XK4P9Q".to_string()),
    };

    let fields = row.fields();
    assert_eq!(fields.len(), OrderExportRow::HEADERS.len());
    assert_eq!(fields[1], "2026-03-01T09:30:00+00:00");
    assert_eq!(fields[4], "", "missing franchise renders as empty cell");
    assert_eq!(fields[9], "44.49");
}

#[test]
fn product_export_joins_tags_and_quotes_commas() {
    let row = ProductExportRow {
        sku: "JF-KTL-01".to_string(),
        name: "Kettle, 1.7L".to_string(),
        category: Some("Home & Kitchen".to_string()),
        status: "active".to_string(),
        price: Decimal::new(2999, 2),
        compare_at_price: None,
        cost_price: Some(Decimal::new(1200, 2)),
        currency: "GBP".to_string(),
        stock_quantity: 14,
        tags: vec!["kitchen".to_string(), "electric".to_string()],
        updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
    };

    let csv = render_csv(&[row]);
    let mut lines = csv.split("\r\n");
    assert_eq!(lines.next(), Some(ProductExportRow::HEADERS.join(",").as_str()));
    let data = lines.next().expect("data row");
    assert!(data.starts_with("JF-KTL-01,\"Kettle, 1.7L\",Home & Kitchen,active,29.99,,12.00,"));
    assert!(data.contains(",kitchen;electric,"));
}

#[test]
fn address_one_line_skips_blank_parts() {
    let address = AddressRow {
        id: 1,
        user_id: 1,
        label: Some("Home".to_string()),
        line1: "10 Downing Street".to_string(),
        line2: Some("  ".to_string()),
        city: "London".to_string(),
        region: None,
        postal_code: "SW1A 2AA".to_string(),
        country: "GB".to_string(),
        latitude: None,
        longitude: None,
        is_default: true,
        created_at: Utc::now(),
    };
    assert_eq!(address.one_line(), "10 Downing Street, London, SW1A 2AA, GB");
}
