//! Live integration tests for jeffy-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/jeffy-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use jeffy_core::domain::{DeliveryStatus, OrderStatus, ProcurementStatus, StockOrderStatus};
use jeffy_core::referral::{CampaignTerms, RewardKind};
use jeffy_core::DomainError;
use jeffy_db::{
    adjust_stock, allocate_stock_orders, assign_delivery, create_campaign, create_driver,
    create_order, create_procurement, create_product, create_referral_code, create_stock_order,
    create_user, expire_campaigns, get_campaign, get_product, latest_driver_location,
    list_order_items, list_stock_order_items, prune_driver_locations, record_driver_location,
    replace_cart, seed_catalog, soft_delete_product, update_delivery_status, update_order_status,
    update_procurement, update_product, update_stock_order_status, DbError, NewCampaign,
    NewDriver, NewOrder, NewOrderLine, NewProcurement, NewProduct, NewStockOrder,
    NewStockOrderItem, NewUser, ProcurementUpdate, ProductUpdate,
};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

async fn insert_product(pool: &sqlx::PgPool, sku: &str, price_cents: i64, stock: i32) -> i64 {
    create_product(
        pool,
        &NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            category_id: None,
            price: money(price_cents),
            compare_at_price: None,
            cost_price: None,
            currency: "GBP".to_string(),
            stock_quantity: stock,
            status: "active".to_string(),
            image_urls: vec![],
            tags: vec![],
        },
    )
    .await
    .unwrap_or_else(|e| panic!("insert_product failed for sku '{sku}': {e}"))
    .id
}

async fn insert_franchise(pool: &sqlx::PgPool, slug: &str) -> i64 {
    jeffy_db::create_franchise(pool, &format!("Franchise {slug}"), slug, None, None)
        .await
        .unwrap_or_else(|e| panic!("insert_franchise failed for slug '{slug}': {e}"))
        .id
}

async fn stock_of(pool: &sqlx::PgPool, product_id: i64) -> i32 {
    get_product(pool, product_id)
        .await
        .expect("get_product")
        .expect("product exists")
        .stock_quantity
}

fn order_of(lines: &[(i64, i32)]) -> NewOrder {
    NewOrder {
        user_id: None,
        franchise_id: None,
        currency: "GBP".to_string(),
        delivery_fee: money(399),
        shipping_address: Some(serde_json::json!({
            "line1": "1 High Street",
            "city": "Leeds",
            "postal_code": "LS1 1AA",
            "country": "GB"
        })),
        referral_code: None,
        notes: None,
        items: lines
            .iter()
            .map(|(product_id, quantity)| NewOrderLine {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Section 1: Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn seed_catalog_is_idempotent(pool: sqlx::PgPool) {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/catalog.yaml");
    let catalog = jeffy_core::load_catalog(&path).expect("load catalog");

    let first = seed_catalog(&pool, &catalog).await.expect("first seed");
    let second = seed_catalog(&pool, &catalog).await.expect("second seed");
    assert_eq!(first, second);

    let franchises: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM franchises")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(usize::try_from(franchises).unwrap(), catalog.franchises.len());
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_update_distinguishes_clear_from_keep(pool: sqlx::PgPool) {
    let id = insert_product(&pool, "JF-UPD", 1000, 5).await;
    update_product(
        &pool,
        id,
        &ProductUpdate {
            description: Some(Some("Stainless".to_string())),
            compare_at_price: Some(Some(money(1500))),
            ..ProductUpdate::default()
        },
    )
    .await
    .expect("first update")
    .expect("exists");

    let row = update_product(
        &pool,
        id,
        &ProductUpdate {
            compare_at_price: Some(None),
            price: Some(money(900)),
            ..ProductUpdate::default()
        },
    )
    .await
    .expect("second update")
    .expect("exists");

    assert_eq!(row.description.as_deref(), Some("Stainless"));
    assert_eq!(row.compare_at_price, None);
    assert_eq!(row.price, money(900));
}

#[sqlx::test(migrations = "../../migrations")]
async fn soft_deleted_product_is_hidden(pool: sqlx::PgPool) {
    let id = insert_product(&pool, "JF-DEL", 1000, 5).await;
    assert!(soft_delete_product(&pool, id).await.expect("delete"));
    assert!(!soft_delete_product(&pool, id).await.expect("second delete"));
    assert!(get_product(&pool, id).await.expect("get").is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn adjust_stock_refuses_to_go_negative(pool: sqlx::PgPool) {
    let id = insert_product(&pool, "JF-ADJ", 1000, 3).await;
    let row = adjust_stock(&pool, id, 4).await.expect("increase");
    assert_eq!(row.stock_quantity, 7);

    let err = adjust_stock(&pool, id, -8).await.unwrap_err();
    assert!(matches!(err, DbError::InsufficientStock { available: 7, .. }));
    assert_eq!(stock_of(&pool, id).await, 7);
}

// ---------------------------------------------------------------------------
// Section 2: Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn order_snapshots_prices_and_reserves_stock(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let mug = insert_product(&pool, "JF-MUG", 450, 10).await;

    let (order, items) = create_order(&pool, &order_of(&[(kettle, 2), (mug, 3)]), Utc::now())
        .await
        .expect("create order");

    assert_eq!(order.status, "pending");
    assert!(order.order_number.starts_with("JF-"));
    assert_eq!(order.subtotal, money(2 * 2999 + 3 * 450));
    assert_eq!(order.total, money(2 * 2999 + 3 * 450 + 399));
    assert_eq!(items.len(), 2);
    assert_eq!(stock_of(&pool, kettle).await, 8);
    assert_eq!(stock_of(&pool, mug).await, 7);
}

#[sqlx::test(migrations = "../../migrations")]
async fn repeated_products_become_one_line_in_product_order(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let mug = insert_product(&pool, "JF-MUG", 450, 10).await;

    let (_, items) = create_order(
        &pool,
        &order_of(&[(mug, 1), (kettle, 1), (mug, 2)]),
        Utc::now(),
    )
    .await
    .expect("create order");

    let lines: Vec<(Option<i64>, i32)> =
        items.iter().map(|i| (i.product_id, i.quantity)).collect();
    assert_eq!(lines, vec![(Some(kettle), 1), (Some(mug), 3)]);
    assert_eq!(stock_of(&pool, mug).await, 7);
}

#[sqlx::test(migrations = "../../migrations")]
async fn order_with_short_stock_changes_nothing(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let mug = insert_product(&pool, "JF-MUG", 450, 1).await;

    let err = create_order(&pool, &order_of(&[(kettle, 2), (mug, 3)]), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InsufficientStock { ref sku, .. } if sku == "JF-MUG"));
    assert_eq!(stock_of(&pool, kettle).await, 10, "rolled back");
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancelling_an_order_restores_stock(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let (order, _) = create_order(&pool, &order_of(&[(kettle, 2), (kettle, 1)]), Utc::now())
        .await
        .expect("create order");
    assert_eq!(stock_of(&pool, kettle).await, 7);

    let cancelled = update_order_status(&pool, order.id, OrderStatus::Cancelled)
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(stock_of(&pool, kettle).await, 10);
    assert_eq!(list_order_items(&pool, order.id).await.expect("items").len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn order_status_cannot_skip_steps(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let (order, _) = create_order(&pool, &order_of(&[(kettle, 1)]), Utc::now())
        .await
        .expect("create order");

    let err = update_order_status(&pool, order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Domain(DomainError::InvalidTransition { .. })
    ));

    let missing = update_order_status(&pool, 999_999, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(missing, DbError::NotFound));
}

// ---------------------------------------------------------------------------
// Section 3: Referrals
// ---------------------------------------------------------------------------

async fn percent_campaign(pool: &sqlx::PgPool, percent: i64, max: Option<i32>) -> i64 {
    create_campaign(
        pool,
        &NewCampaign {
            name: "Spring".to_string(),
            code_prefix: "spring".to_string(),
            terms: CampaignTerms {
                reward_kind: RewardKind::Percent,
                reward_value: Decimal::from(percent),
                min_order_total: Decimal::ZERO,
                max_redemptions: max,
                starts_at: None,
                ends_at: None,
                is_active: true,
            },
        },
    )
    .await
    .expect("create campaign")
    .id
}

#[sqlx::test(migrations = "../../migrations")]
async fn referral_code_discounts_order_and_cancel_releases_it(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2000, 10).await;
    let campaign_id = percent_campaign(&pool, 10, None).await;
    let code = create_referral_code(&pool, campaign_id, None)
        .await
        .expect("code");
    assert!(code.code.starts_with("SPRING-"));

    let mut new_order = order_of(&[(kettle, 2)]);
    new_order.referral_code = Some(code.code.to_lowercase());
    let (order, _) = create_order(&pool, &new_order, Utc::now())
        .await
        .expect("order with code");

    assert_eq!(order.discount_total, money(400));
    assert_eq!(order.total, money(4000 - 400 + 399));
    assert_eq!(order.referral_code.as_deref(), Some(code.code.as_str()));

    let count: i32 =
        sqlx::query_scalar("SELECT redemption_count FROM referral_codes WHERE id = $1")
            .bind(code.id)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(count, 1);

    update_order_status(&pool, order.id, OrderStatus::Cancelled)
        .await
        .expect("cancel");
    let count: i32 =
        sqlx::query_scalar("SELECT redemption_count FROM referral_codes WHERE id = $1")
            .bind(code.id)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn exhausted_campaign_rejects_order(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2000, 10).await;
    let campaign_id = percent_campaign(&pool, 10, Some(1)).await;
    let code = create_referral_code(&pool, campaign_id, None)
        .await
        .expect("code");

    let mut new_order = order_of(&[(kettle, 1)]);
    new_order.referral_code = Some(code.code.clone());
    create_order(&pool, &new_order, Utc::now())
        .await
        .expect("first redemption");

    let err = create_order(&pool, &new_order, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Referral(jeffy_core::ReferralError::Exhausted)
    ));
    assert_eq!(stock_of(&pool, kettle).await, 9, "second order rolled back");
}

#[sqlx::test(migrations = "../../migrations")]
async fn expire_campaigns_deactivates_past_windows(pool: sqlx::PgPool) {
    let now = Utc::now();
    let campaign = create_campaign(
        &pool,
        &NewCampaign {
            name: "Winter".to_string(),
            code_prefix: "WINTER".to_string(),
            terms: CampaignTerms {
                reward_kind: RewardKind::Fixed,
                reward_value: Decimal::from(5),
                min_order_total: Decimal::ZERO,
                max_redemptions: None,
                starts_at: Some(now - Duration::days(30)),
                ends_at: Some(now - Duration::days(1)),
                is_active: true,
            },
        },
    )
    .await
    .expect("campaign");

    assert_eq!(expire_campaigns(&pool, now).await.expect("expire"), 1);
    assert_eq!(expire_campaigns(&pool, now).await.expect("expire again"), 0);
    let reloaded = get_campaign(&pool, campaign.id)
        .await
        .expect("get")
        .expect("exists");
    assert!(!reloaded.is_active);
}

// ---------------------------------------------------------------------------
// Section 4: Stock orders
// ---------------------------------------------------------------------------

async fn submit_stock_order(pool: &sqlx::PgPool, franchise_id: i64, product_id: i64, qty: i32) -> i64 {
    create_stock_order(
        pool,
        &NewStockOrder {
            franchise_id,
            notes: None,
            submit: true,
            items: vec![NewStockOrderItem {
                product_id,
                quantity: qty,
            }],
        },
        Utc::now(),
    )
    .await
    .expect("create stock order")
    .id
}

#[sqlx::test(migrations = "../../migrations")]
async fn allocation_splits_short_stock_across_franchises(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "JF-FAN", 1500, 10).await;
    let north = insert_franchise(&pool, "north").await;
    let south = insert_franchise(&pool, "south").await;
    let a = submit_stock_order(&pool, north, product, 6).await;
    let b = submit_stock_order(&pool, south, product, 9).await;

    let summary = allocate_stock_orders(&pool, None).await.expect("allocate");
    assert_eq!(summary.orders_allocated, 2);
    assert_eq!(summary.units_allocated, 10);
    assert_eq!(summary.units_short, 5);

    let a_items = list_stock_order_items(&pool, a).await.expect("items a");
    let b_items = list_stock_order_items(&pool, b).await.expect("items b");
    assert_eq!(a_items[0].allocated_quantity, 4);
    assert_eq!(b_items[0].allocated_quantity, 6);
    assert_eq!(stock_of(&pool, product).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn single_order_allocation_takes_only_its_fair_share(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "JF-FAN", 1500, 10).await;
    let north = insert_franchise(&pool, "north").await;
    let south = insert_franchise(&pool, "south").await;
    let a = submit_stock_order(&pool, north, product, 6).await;
    let b = submit_stock_order(&pool, south, product, 9).await;

    let row = update_stock_order_status(&pool, a, StockOrderStatus::Allocated)
        .await
        .expect("allocate a");
    assert_eq!(row.status, "allocated");
    assert_eq!(stock_of(&pool, product).await, 6);

    let b_items = list_stock_order_items(&pool, b).await.expect("items b");
    assert_eq!(b_items[0].allocated_quantity, 0);

    let cancelled = update_stock_order_status(&pool, a, StockOrderStatus::Cancelled)
        .await
        .expect("cancel a");
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(stock_of(&pool, product).await, 10, "allocation returned");
}

#[sqlx::test(migrations = "../../migrations")]
async fn draft_stock_order_cannot_be_allocated(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "JF-FAN", 1500, 10).await;
    let north = insert_franchise(&pool, "north").await;
    let draft = create_stock_order(
        &pool,
        &NewStockOrder {
            franchise_id: north,
            notes: None,
            submit: false,
            items: vec![NewStockOrderItem {
                product_id: product,
                quantity: 2,
            }],
        },
        Utc::now(),
    )
    .await
    .expect("draft");

    let err = allocate_stock_orders(&pool, Some(&[draft.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(_)));
    assert_eq!(stock_of(&pool, product).await, 10);
}

// ---------------------------------------------------------------------------
// Section 5: Deliveries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn delivery_lifecycle_drives_order_status(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let (order, _) = create_order(&pool, &order_of(&[(kettle, 1)]), Utc::now())
        .await
        .expect("order");
    update_order_status(&pool, order.id, OrderStatus::Confirmed)
        .await
        .expect("confirm");
    update_order_status(&pool, order.id, OrderStatus::Processing)
        .await
        .expect("process");

    let driver = create_driver(
        &pool,
        &NewDriver {
            user_id: None,
            full_name: "Sam Driver".to_string(),
            phone: None,
            vehicle: Some("van".to_string()),
        },
    )
    .await
    .expect("driver");

    let delivery = assign_delivery(&pool, order.id, driver.id)
        .await
        .expect("assign");
    assert_eq!(delivery.status, "assigned");
    assert_eq!(delivery.driver_name, "Sam Driver");

    let second = assign_delivery(&pool, order.id, driver.id).await.unwrap_err();
    assert!(second.is_unique_violation(), "one open assignment per order");

    let change = update_delivery_status(&pool, delivery.id, DeliveryStatus::PickedUp, None)
        .await
        .expect("pick up");
    assert_eq!(change.order_status, Some(OrderStatus::OutForDelivery));
    assert!(change.delivery.picked_up_at.is_some());

    update_delivery_status(&pool, delivery.id, DeliveryStatus::InTransit, None)
        .await
        .expect("in transit");
    let change = update_delivery_status(&pool, delivery.id, DeliveryStatus::Delivered, None)
        .await
        .expect("deliver");
    assert_eq!(change.order_status, Some(OrderStatus::Delivered));

    let available: bool = sqlx::query_scalar("SELECT is_available FROM drivers WHERE id = $1")
        .bind(driver.id)
        .fetch_one(&pool)
        .await
        .expect("driver row");
    assert!(available, "driver freed after delivery");
}

async fn van_driver(pool: &sqlx::PgPool, name: &str) -> i64 {
    create_driver(
        pool,
        &NewDriver {
            user_id: None,
            full_name: name.to_string(),
            phone: None,
            vehicle: Some("van".to_string()),
        },
    )
    .await
    .expect("driver")
    .id
}

#[sqlx::test(migrations = "../../migrations")]
async fn confirmed_order_reaches_delivered(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let (order, _) = create_order(&pool, &order_of(&[(kettle, 1)]), Utc::now())
        .await
        .expect("order");
    update_order_status(&pool, order.id, OrderStatus::Confirmed)
        .await
        .expect("confirm");
    let driver = van_driver(&pool, "Sam Driver").await;

    let delivery = assign_delivery(&pool, order.id, driver)
        .await
        .expect("assign confirmed order");
    let change = update_delivery_status(&pool, delivery.id, DeliveryStatus::PickedUp, None)
        .await
        .expect("pick up");
    assert_eq!(change.order_status, Some(OrderStatus::OutForDelivery));
    update_delivery_status(&pool, delivery.id, DeliveryStatus::InTransit, None)
        .await
        .expect("in transit");
    let change = update_delivery_status(&pool, delivery.id, DeliveryStatus::Delivered, None)
        .await
        .expect("deliver");
    assert_eq!(change.order_status, Some(OrderStatus::Delivered));

    let status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(order.id)
        .fetch_one(&pool)
        .await
        .expect("order row");
    assert_eq!(status, "delivered");
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_delivery_returns_order_for_reassignment(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let (order, _) = create_order(&pool, &order_of(&[(kettle, 1)]), Utc::now())
        .await
        .expect("order");
    update_order_status(&pool, order.id, OrderStatus::Confirmed)
        .await
        .expect("confirm");
    update_order_status(&pool, order.id, OrderStatus::Processing)
        .await
        .expect("process");
    let first_driver = van_driver(&pool, "Sam Driver").await;
    let second_driver = van_driver(&pool, "Alex Driver").await;

    let first = assign_delivery(&pool, order.id, first_driver)
        .await
        .expect("assign");
    update_delivery_status(&pool, first.id, DeliveryStatus::PickedUp, None)
        .await
        .expect("pick up");
    let change = update_delivery_status(
        &pool,
        first.id,
        DeliveryStatus::Failed,
        Some("nobody home"),
    )
    .await
    .expect("fail");
    assert_eq!(change.order_status, Some(OrderStatus::Processing));
    assert_eq!(change.delivery.failure_reason.as_deref(), Some("nobody home"));

    let second = assign_delivery(&pool, order.id, second_driver)
        .await
        .expect("reassign after failure");
    update_delivery_status(&pool, second.id, DeliveryStatus::PickedUp, None)
        .await
        .expect("pick up again");
    update_delivery_status(&pool, second.id, DeliveryStatus::InTransit, None)
        .await
        .expect("in transit");
    let change = update_delivery_status(&pool, second.id, DeliveryStatus::Delivered, None)
        .await
        .expect("deliver");
    assert_eq!(change.order_status, Some(OrderStatus::Delivered));
}

#[sqlx::test(migrations = "../../migrations")]
async fn pending_order_cannot_be_assigned(pool: sqlx::PgPool) {
    let kettle = insert_product(&pool, "JF-KTL", 2999, 10).await;
    let (order, _) = create_order(&pool, &order_of(&[(kettle, 1)]), Utc::now())
        .await
        .expect("order");
    let driver = create_driver(
        &pool,
        &NewDriver {
            user_id: None,
            full_name: "Sam Driver".to_string(),
            phone: None,
            vehicle: None,
        },
    )
    .await
    .expect("driver");

    let err = assign_delivery(&pool, order.id, driver.id).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn prune_removes_only_old_pings(pool: sqlx::PgPool) {
    let driver = create_driver(
        &pool,
        &NewDriver {
            user_id: None,
            full_name: "Pat".to_string(),
            phone: None,
            vehicle: None,
        },
    )
    .await
    .expect("driver");

    sqlx::query(
        "INSERT INTO driver_locations (driver_id, latitude, longitude, recorded_at) \
         VALUES ($1, 51.5, -0.12, NOW() - INTERVAL '10 days')",
    )
    .bind(driver.id)
    .execute(&pool)
    .await
    .expect("old ping");
    record_driver_location(&pool, driver.id, 51.51, -0.13, Some(90.0))
        .await
        .expect("fresh ping");

    let removed = prune_driver_locations(&pool, Utc::now() - Duration::days(7))
        .await
        .expect("prune");
    assert_eq!(removed, 1);

    let latest = latest_driver_location(&pool, driver.id)
        .await
        .expect("latest")
        .expect("fresh ping kept");
    assert!((latest.latitude - 51.51).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Section 6: Procurement and users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn received_procurement_restocks_product(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "JF-PRC", 800, 2).await;
    let entry = create_procurement(
        &pool,
        &NewProcurement {
            product_id: product,
            distributor_id: None,
            quantity: 25,
            priority: 1,
            requested_by: Some("ops".to_string()),
            notes: None,
        },
    )
    .await
    .expect("queue");
    assert_eq!(entry.status, "queued");

    let skip = update_procurement(
        &pool,
        entry.id,
        &ProcurementUpdate {
            status: Some(ProcurementStatus::Received),
            ..ProcurementUpdate::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(skip, DbError::Domain(_)));

    for status in [ProcurementStatus::Ordered, ProcurementStatus::Received] {
        update_procurement(
            &pool,
            entry.id,
            &ProcurementUpdate {
                status: Some(status),
                ..ProcurementUpdate::default()
            },
        )
        .await
        .expect("advance");
    }
    assert_eq!(stock_of(&pool, product).await, 27);
}

#[sqlx::test(migrations = "../../migrations")]
async fn replace_cart_merges_duplicate_lines(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "JF-CRT", 500, 20).await;
    let user = create_user(
        &pool,
        &NewUser {
            email: "cart@example.com".to_string(),
            full_name: None,
            phone: None,
            role: "customer".to_string(),
            franchise_id: None,
        },
    )
    .await
    .expect("user");

    let cart = replace_cart(&pool, user.id, &[(product, 2), (product, 3)])
        .await
        .expect("cart");
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 5);
    assert_eq!(cart[0].line_total, money(2500));

    let err = replace_cart(&pool, user.id, &[(product, 0)]).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}
