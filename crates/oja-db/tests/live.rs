//! Live integration tests for oja-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. `"../../migrations"` resolves to the workspace
//! migration directory.

use rust_decimal::Decimal;
use std::str::FromStr;

use oja_core::catalog::parse_catalog_seed;
use oja_core::OrderStatus;
use oja_db::{
    cancel_pending_order, count_payments_for_order, create_order, create_refund_request,
    create_user, expire_pending_orders, get_latest_payment_for_order, get_order_by_reference,
    get_pricing_settings, get_purchase_order_for_supplier, get_successful_payment_for_order,
    list_categories, list_offers_for_line, list_order_items, list_purchase_order_statuses,
    list_products, list_purchase_orders_for_order, list_purchase_orders_for_supplier,
    mark_order_paid, mark_purchase_order_paid_out, record_payment_result, seed_catalog,
    set_order_status, update_purchase_order_status, upsert_initialized_payment, DbError,
    NewOrder, NewOrderItem, NewRefund, PaymentUpdate, ProductFilters,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SEED: &str = r"
categories:
  - name: Phones
  - name: Android Phones
    parent: phones
suppliers:
  - name: Ikeja Gadgets
  - name: Alaba Mart
products:
  - name: Tecno Spark 10
    category: android-phones
    offers:
      - { supplier: ikeja-gadgets, price: '500.00', quantity: 3 }
      - { supplier: alaba-mart, price: '450.00', quantity: 2 }
  - name: Phone Case
    category: phones
    variants:
      - sku: CASE-BLK
        title: Black
        attributes: { colour: black }
        offers:
          - { supplier: alaba-mart, price: '1500.00', quantity: 10 }
";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_else(|e| panic!("bad decimal {s}: {e}"))
}

async fn seeded(pool: &sqlx::PgPool) {
    let seed = parse_catalog_seed(SEED).expect("seed parses");
    seed_catalog(pool, &seed).await.expect("seed applies");
}

async fn product_id(pool: &sqlx::PgPool, slug: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE slug = $1")
        .bind(slug)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("product {slug} missing: {e}"))
}

async fn customer(pool: &sqlx::PgPool, email: &str) -> i64 {
    create_user(pool, email, "hash", "Ada Obi", None, "customer")
        .await
        .expect("create user")
        .id
}

/// Builds a two-supplier order for the Tecno product: 2 from the cheaper
/// offer, 1 from the other.
async fn tecno_order(pool: &sqlx::PgPool, user_id: i64, reference: &str) -> i64 {
    let product = product_id(pool, "tecno-spark-10").await;
    let offers = list_offers_for_line(pool, product, None).await.expect("offers");
    assert_eq!(offers.len(), 2);
    let (cheap, dear) = (&offers[0], &offers[1]);

    let order = NewOrder {
        user_id,
        items_subtotal: dec("1540.00"),
        tax_total: dec("115.50"),
        service_fee: dec("200.00"),
        total: dec("1855.50"),
        shipping: serde_json::json!({ "city": "Lagos" }),
        payment_reference: reference,
        items: vec![
            NewOrderItem {
                product_id: product,
                variant_id: None,
                supplier_id: cheap.supplier_id,
                offer_id: cheap.id,
                quantity: 2,
                unit_cost: cheap.price,
                unit_price: dec("495.00"),
                line_total: dec("990.00"),
            },
            NewOrderItem {
                product_id: product,
                variant_id: None,
                supplier_id: dear.supplier_id,
                offer_id: dear.id,
                quantity: 1,
                unit_cost: dear.price,
                unit_price: dec("550.00"),
                line_total: dec("550.00"),
            },
        ],
    };
    create_order(pool, &order).await.expect("create order").id
}

async fn stock(pool: &sqlx::PgPool, product: i64) -> Vec<i32> {
    list_offers_for_line(pool, product, None)
        .await
        .expect("offers")
        .into_iter()
        .map(|o| o.available_qty)
        .collect()
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn seed_is_idempotent(pool: sqlx::PgPool) {
    seeded(&pool).await;
    seeded(&pool).await;

    let categories = list_categories(&pool).await.expect("categories");
    assert_eq!(categories.len(), 2);

    let products = list_products(
        &pool,
        ProductFilters {
            limit: 50,
            ..ProductFilters::default()
        },
    )
    .await
    .expect("products");
    assert_eq!(products.len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn category_filter_includes_children(pool: sqlx::PgPool) {
    seeded(&pool).await;

    let products = list_products(
        &pool,
        ProductFilters {
            category_slug: Some("phones"),
            limit: 50,
            ..ProductFilters::default()
        },
    )
    .await
    .expect("products");
    assert_eq!(products.len(), 2);

    let searched = list_products(
        &pool,
        ProductFilters {
            search: Some("tecno"),
            limit: 50,
            ..ProductFilters::default()
        },
    )
    .await
    .expect("products");
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].slug, "tecno-spark-10");
    assert_eq!(searched[0].category_slug.as_deref(), Some("android-phones"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn default_pricing_settings_row_exists(pool: sqlx::PgPool) {
    let settings = get_pricing_settings(&pool).await.expect("settings");
    assert_eq!(settings.vat_percent, dec("7.5"));
    assert_eq!(settings.base_service_fee, dec("100"));
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_order_reserves_stock_and_splits_purchase_orders(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;
    let product = product_id(&pool, "tecno-spark-10").await;

    // cheaper offer: 2 - 2 = 0, dearer offer: 3 - 1 = 2
    assert_eq!(stock(&pool, product).await, vec![0, 2]);

    let items = list_order_items(&pool, order_id).await.expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_name, "Tecno Spark 10");

    let pos = list_purchase_orders_for_order(&pool, order_id).await.expect("pos");
    assert_eq!(pos.len(), 2);
    let subtotals: Decimal = pos.iter().map(|p| p.supplier_subtotal).sum();
    assert_eq!(subtotals, dec("1400.00"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn insufficient_stock_rolls_back_everything(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    tecno_order(&pool, user, "OJA-TEST-1").await;

    let product = product_id(&pool, "tecno-spark-10").await;
    let offers = list_offers_for_line(&pool, product, None).await.expect("offers");
    let empty = offers.iter().find(|o| o.available_qty == 0).expect("drained offer");

    let order = NewOrder {
        user_id: user,
        items_subtotal: dec("495.00"),
        tax_total: dec("37.13"),
        service_fee: dec("200.00"),
        total: dec("732.13"),
        shipping: serde_json::json!({}),
        payment_reference: "OJA-TEST-2",
        items: vec![NewOrderItem {
            product_id: product,
            variant_id: None,
            supplier_id: empty.supplier_id,
            offer_id: empty.id,
            quantity: 1,
            unit_cost: empty.price,
            unit_price: dec("495.00"),
            line_total: dec("495.00"),
        }],
    };

    let err = create_order(&pool, &order).await.expect_err("should fail");
    assert!(matches!(err, DbError::InsufficientStock { offer_id, .. } if offer_id == empty.id));

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(orders, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_restores_stock_once(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;
    let product = product_id(&pool, "tecno-spark-10").await;

    assert!(cancel_pending_order(&pool, order_id).await.expect("cancel"));
    assert!(!cancel_pending_order(&pool, order_id).await.expect("second cancel"));
    assert_eq!(stock(&pool, product).await, vec![2, 3]);

    let statuses = list_purchase_order_statuses(&pool, order_id).await.expect("statuses");
    assert!(statuses.iter().all(|s| s == "cancelled"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn expire_only_touches_old_pending_orders(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let stale = tecno_order(&pool, user, "OJA-TEST-1").await;

    sqlx::query("UPDATE orders SET created_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(stale)
        .execute(&pool)
        .await
        .expect("age order");

    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(60);
    assert_eq!(expire_pending_orders(&pool, cutoff).await.expect("expire"), 1);
    assert_eq!(expire_pending_orders(&pool, cutoff).await.expect("expire"), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn mark_order_paid_is_idempotent(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;

    assert!(mark_order_paid(&pool, order_id).await.expect("paid"));
    assert!(!mark_order_paid(&pool, order_id).await.expect("paid again"));

    // a paid order can no longer be cancelled as pending
    assert!(!cancel_pending_order(&pool, order_id).await.expect("cancel"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn purchase_order_status_is_compare_and_set(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;
    mark_order_paid(&pool, order_id).await.expect("paid");

    let po = list_purchase_orders_for_order(&pool, order_id)
        .await
        .expect("pos")
        .remove(0);

    update_purchase_order_status(&pool, po.id, "pending", "confirmed")
        .await
        .expect("confirm");
    let err = update_purchase_order_status(&pool, po.id, "pending", "cancelled")
        .await
        .expect_err("stale transition");
    assert!(matches!(err, DbError::Conflict(_)));

    let err = mark_purchase_order_paid_out(&pool, po.public_id)
        .await
        .expect_err("not delivered yet");
    assert!(matches!(err, DbError::Conflict(_)));

    update_purchase_order_status(&pool, po.id, "confirmed", "shipped")
        .await
        .expect("ship");
    update_purchase_order_status(&pool, po.id, "shipped", "delivered")
        .await
        .expect("deliver");
    let paid = mark_purchase_order_paid_out(&pool, po.public_id)
        .await
        .expect("payout");
    assert_eq!(paid.payout_status, "paid");
}

#[sqlx::test(migrations = "../../migrations")]
async fn suppliers_only_see_paid_orders(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let expired = tecno_order(&pool, user, "OJA-TEST-1").await;
    let paid = tecno_order(&pool, user, "OJA-TEST-2").await;

    sqlx::query("UPDATE orders SET created_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(expired)
        .execute(&pool)
        .await
        .expect("age order");
    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(60);
    assert_eq!(expire_pending_orders(&pool, cutoff).await.expect("expire"), 1);
    mark_order_paid(&pool, paid).await.expect("paid");

    let expired_po = list_purchase_orders_for_order(&pool, expired)
        .await
        .expect("pos")
        .remove(0);
    let supplier_id = expired_po.supplier_id;

    let listed = list_purchase_orders_for_supplier(&pool, supplier_id, None, 50, 0)
        .await
        .expect("supplier list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].order_id, paid);

    let hidden = get_purchase_order_for_supplier(&pool, supplier_id, expired_po.public_id)
        .await
        .expect("lookup");
    assert!(hidden.is_none());
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn retried_checkout_resolves_to_its_order(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;

    upsert_initialized_payment(&pool, order_id, "OJA-TEST-1", 185_550, "https://pay/a", "a")
        .await
        .expect("first attempt");
    record_payment_result(
        &pool,
        order_id,
        &PaymentUpdate {
            reference: "OJA-TEST-1",
            status: "abandoned",
            amount_kobo: 185_550,
            gateway_response: None,
            channel: None,
            paid_at: None,
            raw: serde_json::json!({}),
        },
    )
    .await
    .expect("abandoned");
    upsert_initialized_payment(&pool, order_id, "OJA-TEST-1-2", 185_550, "https://pay/b", "b")
        .await
        .expect("second attempt");

    assert_eq!(count_payments_for_order(&pool, order_id).await.expect("count"), 2);
    let latest = get_latest_payment_for_order(&pool, order_id)
        .await
        .expect("latest")
        .expect("has payment");
    assert_eq!(latest.reference, "OJA-TEST-1-2");
    assert!(get_successful_payment_for_order(&pool, order_id)
        .await
        .expect("success lookup")
        .is_none());

    let by_attempt = get_order_by_reference(&pool, "OJA-TEST-1-2")
        .await
        .expect("lookup")
        .expect("order found");
    assert_eq!(by_attempt.id, order_id);
    assert!(get_order_by_reference(&pool, "OJA-NOPE")
        .await
        .expect("lookup")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn success_is_never_downgraded(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;

    let mut update = PaymentUpdate {
        reference: "OJA-TEST-1",
        status: "success",
        amount_kobo: 185_550,
        gateway_response: Some("Approved"),
        channel: Some("card"),
        paid_at: Some(chrono::Utc::now()),
        raw: serde_json::json!({}),
    };
    record_payment_result(&pool, order_id, &update).await.expect("success");
    update.status = "failed";
    let row = record_payment_result(&pool, order_id, &update).await.expect("stale");
    assert_eq!(row.status, "success");

    let paid = get_successful_payment_for_order(&pool, order_id)
        .await
        .expect("lookup")
        .expect("success row");
    assert_eq!(paid.reference, "OJA-TEST-1");
}

// ---------------------------------------------------------------------------
// Refunds
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn refunds_cannot_exceed_order_total(pool: sqlx::PgPool) {
    seeded(&pool).await;
    let user = customer(&pool, "ada@example.com").await;
    let order_id = tecno_order(&pool, user, "OJA-TEST-1").await;
    mark_order_paid(&pool, order_id).await.expect("paid");
    set_order_status(&pool, order_id, OrderStatus::Delivered)
        .await
        .expect("deliver");

    let first = NewRefund {
        order_id,
        user_id: user,
        order_item_id: None,
        amount: dec("1000.00"),
        reason: "one unit arrived cracked",
    };
    create_refund_request(&pool, &first).await.expect("first refund");

    let second = NewRefund {
        amount: dec("900.00"),
        ..first.clone()
    };
    let err = create_refund_request(&pool, &second)
        .await
        .expect_err("over balance");
    assert!(matches!(err, DbError::Conflict(_)));

    let third = NewRefund {
        amount: dec("855.50"),
        ..first
    };
    create_refund_request(&pool, &third).await.expect("exact balance");
}
