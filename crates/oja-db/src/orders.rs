//! Database operations for `orders` and `order_items`.
//!
//! Creating an order also creates one purchase order per supplier and
//! reserves stock on every allocated offer, all in a single transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use oja_core::OrderStatus;

use crate::offers::{release_stock, reserve_stock, OfferKind};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub status: String,
    pub items_subtotal: Decimal,
    pub tax_total: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub shipping: serde_json::Value,
    pub payment_reference: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line with product and variant names joined in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub purchase_order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub variant_id: Option<i64>,
    pub variant_title: Option<String>,
    pub supplier_id: i64,
    pub offer_kind: String,
    pub offer_id: i64,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// One allocated slice of a cart line, ready to persist.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub supplier_id: i64,
    pub offer_id: i64,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: i64,
    pub items_subtotal: Decimal,
    pub tax_total: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub shipping: serde_json::Value,
    pub payment_reference: &'a str,
    pub items: Vec<NewOrderItem>,
}

const ORDER_COLUMNS: &str = "id, public_id, user_id, status, items_subtotal, tax_total, \
     service_fee, total, currency, shipping, payment_reference, paid_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Creates an order with its purchase orders and items, reserving stock.
///
/// # Errors
///
/// Returns [`DbError::InsufficientStock`] if any offer no longer covers its
/// allocated quantity (nothing is written), [`DbError::Conflict`] on a
/// duplicate payment reference, or [`DbError::Sqlx`] for other failures.
pub async fn create_order(pool: &PgPool, order: &NewOrder<'_>) -> Result<OrderRow, DbError> {
    if order.items.is_empty() {
        return Err(DbError::Conflict("an order needs at least one item".to_string()));
    }

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO orders \
             (user_id, items_subtotal, tax_total, service_fee, total, shipping, payment_reference) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order.user_id)
    .bind(order.items_subtotal)
    .bind(order.tax_total)
    .bind(order.service_fee)
    .bind(order.total)
    .bind(&order.shipping)
    .bind(order.payment_reference)
    .fetch_one(&mut *tx)
    .await
    .map_err(DbError::from);

    let row = match inserted {
        Err(e) if e.is_unique_violation() => {
            return Err(DbError::Conflict(
                "payment reference already in use".to_string(),
            ))
        }
        other => other?,
    };

    for item in &order.items {
        reserve_stock(
            &mut *tx,
            OfferKind::for_variant(item.variant_id),
            item.offer_id,
            item.quantity,
        )
        .await?;
    }

    let mut by_supplier: BTreeMap<i64, Vec<&NewOrderItem>> = BTreeMap::new();
    for item in &order.items {
        by_supplier.entry(item.supplier_id).or_default().push(item);
    }

    for (supplier_id, items) in by_supplier {
        let supplier_subtotal: Decimal = items
            .iter()
            .map(|i| i.unit_cost * Decimal::from(i.quantity))
            .sum();

        let po_id: i64 = sqlx::query_scalar(
            "INSERT INTO purchase_orders (order_id, supplier_id, supplier_subtotal) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(row.id)
        .bind(supplier_id)
        .bind(supplier_subtotal.round_dp(2))
        .fetch_one(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items \
                     (order_id, purchase_order_id, product_id, variant_id, supplier_id, \
                      offer_kind, offer_id, quantity, unit_cost, unit_price, line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(row.id)
            .bind(po_id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(supplier_id)
            .bind(OfferKind::for_variant(item.variant_id).as_str())
            .bind(item.offer_id)
            .bind(item.quantity)
            .bind(item.unit_cost)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(row)
}

/// Cancels an order that is still awaiting payment and returns its stock.
/// Returns `false` when the order is not in `pending_payment`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back.
pub async fn cancel_pending_order(pool: &PgPool, order_id: i64) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    let cancelled: Option<i64> = sqlx::query_scalar(
        "UPDATE orders SET status = 'cancelled', updated_at = NOW() \
         WHERE id = $1 AND status = 'pending_payment' \
         RETURNING id",
    )
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await?;

    if cancelled.is_none() {
        tx.rollback().await?;
        return Ok(false);
    }

    let reserved: Vec<(String, i64, i32)> = sqlx::query_as(
        "SELECT offer_kind, offer_id, quantity FROM order_items WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut *tx)
    .await?;

    for (kind, offer_id, quantity) in reserved {
        let kind = if kind == OfferKind::Variant.as_str() {
            OfferKind::Variant
        } else {
            OfferKind::Product
        };
        release_stock(&mut *tx, kind, offer_id, quantity).await?;
    }

    sqlx::query(
        "UPDATE purchase_orders SET status = 'cancelled', updated_at = NOW() WHERE order_id = $1",
    )
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Cancels every `pending_payment` order created before `cutoff`.
/// Returns the number of orders cancelled.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the lookup fails. Individual cancellation
/// failures are logged and skipped.
pub async fn expire_pending_orders(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let stale: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM orders \
         WHERE status = 'pending_payment' AND created_at < $1 \
         ORDER BY created_at",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let mut expired = 0_u64;
    for order_id in stale {
        match cancel_pending_order(pool, order_id).await {
            Ok(true) => expired += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(order_id, error = %e, "failed to expire pending order"),
        }
    }
    Ok(expired)
}

/// Moves an order from `pending_payment` to `paid`. Returns `false` if the
/// order was not awaiting payment, so repeated settlement is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_order_paid(pool: &PgPool, order_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', paid_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status = 'pending_payment'",
    )
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Overwrites an order's status. Callers validate the transition.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order does not exist.
pub async fn set_order_status(
    pool: &PgPool,
    order_id: i64,
    status: OrderStatus,
) -> Result<OrderRow, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;
    row.ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_id(pool: &PgPool, order_id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns an order only if it belongs to `user_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_for_user(
    pool: &PgPool,
    user_id: i64,
    public_id: Uuid,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE public_id = $1 AND user_id = $2"
    ))
    .bind(public_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Finds the order behind a Paystack reference: either the order's own
/// reference or the reference of any of its checkout attempts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_reference(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE payment_reference = $1 \
            OR id = (SELECT order_id FROM payments WHERE reference = $1)"
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Lists a customer's orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_items(pool: &PgPool, order_id: i64) -> Result<Vec<OrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT i.id, i.order_id, i.purchase_order_id, i.product_id, p.name AS product_name, \
                i.variant_id, v.title AS variant_title, i.supplier_id, i.offer_kind, i.offer_id, \
                i.quantity, i.unit_cost, i.unit_price, i.line_total \
         FROM order_items i \
         JOIN products p ON p.id = i.product_id \
         LEFT JOIN product_variants v ON v.id = i.variant_id \
         WHERE i.order_id = $1 \
         ORDER BY i.id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
