//! Database operations for `purchase_orders`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `purchase_orders` table plus the parent order's public id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseOrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub order_id: i64,
    pub order_public_id: Uuid,
    pub supplier_id: i64,
    pub status: String,
    pub supplier_subtotal: Decimal,
    pub payout_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PO_COLUMNS: &str = "po.id, po.public_id, po.order_id, \
     (SELECT o.public_id FROM orders o WHERE o.id = po.order_id) AS order_public_id, \
     po.supplier_id, po.status, po.supplier_subtotal, po.payout_status, \
     po.created_at, po.updated_at";

/// Lists a supplier's purchase orders, newest first. Orders that were never
/// paid for, including expired ones, are hidden from suppliers.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_purchase_orders_for_supplier(
    pool: &PgPool,
    supplier_id: i64,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PurchaseOrderRow>, DbError> {
    let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {PO_COLUMNS} \
         FROM purchase_orders po \
         JOIN orders o ON o.id = po.order_id \
         WHERE po.supplier_id = $1 \
           AND o.paid_at IS NOT NULL \
           AND ($2::text IS NULL OR po.status = $2) \
         ORDER BY po.created_at DESC, po.id DESC \
         LIMIT $3 OFFSET $4"
    ))
    .bind(supplier_id)
    .bind(status)
    .bind(limit)
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns one purchase order if it belongs to `supplier_id` and its order
/// has been paid for.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_purchase_order_for_supplier(
    pool: &PgPool,
    supplier_id: i64,
    public_id: Uuid,
) -> Result<Option<PurchaseOrderRow>, DbError> {
    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {PO_COLUMNS} \
         FROM purchase_orders po \
         JOIN orders o ON o.id = po.order_id \
         WHERE po.public_id = $1 AND po.supplier_id = $2 AND o.paid_at IS NOT NULL"
    ))
    .bind(public_id)
    .bind(supplier_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_purchase_orders_for_order(
    pool: &PgPool,
    order_id: i64,
) -> Result<Vec<PurchaseOrderRow>, DbError> {
    let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {PO_COLUMNS} FROM purchase_orders po WHERE po.order_id = $1 ORDER BY po.id"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Raw status strings of every purchase order under an order, for rollup.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_purchase_order_statuses(
    pool: &PgPool,
    order_id: i64,
) -> Result<Vec<String>, DbError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT status FROM purchase_orders WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Compare-and-set on a purchase order's status.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the status is no longer `from` (another
/// request moved it first).
pub async fn update_purchase_order_status(
    pool: &PgPool,
    purchase_order_id: i64,
    from: &str,
    to: &str,
) -> Result<PurchaseOrderRow, DbError> {
    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "UPDATE purchase_orders po SET status = $3, updated_at = NOW() \
         WHERE po.id = $1 AND po.status = $2 \
         RETURNING {PO_COLUMNS}"
    ))
    .bind(purchase_order_id)
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| {
        DbError::Conflict(format!("purchase order is no longer '{from}'"))
    })
}

/// Marks a delivered purchase order as paid out to the supplier.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, or [`DbError::Conflict`]
/// if the purchase order is not delivered or was already paid out.
pub async fn mark_purchase_order_paid_out(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<PurchaseOrderRow, DbError> {
    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "UPDATE purchase_orders po SET payout_status = 'paid', updated_at = NOW() \
         WHERE po.public_id = $1 AND po.status = 'delivered' AND po.payout_status = 'unpaid' \
         RETURNING {PO_COLUMNS}"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(row);
    }

    let exists: Option<(String, String)> = sqlx::query_as(
        "SELECT status, payout_status FROM purchase_orders WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    match exists {
        None => Err(DbError::NotFound),
        Some((_, payout)) if payout == "paid" => Err(DbError::Conflict(
            "purchase order was already paid out".to_string(),
        )),
        Some((status, _)) => Err(DbError::Conflict(format!(
            "purchase order is '{status}', only delivered purchase orders can be paid out"
        ))),
    }
}

/// User ids of the supplier accounts involved in an order, for notifications.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_supplier_user_ids_for_order(
    pool: &PgPool,
    order_id: i64,
) -> Result<Vec<i64>, DbError> {
    let rows = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT s.user_id \
         FROM purchase_orders po \
         JOIN suppliers s ON s.id = po.supplier_id \
         WHERE po.order_id = $1 AND s.user_id IS NOT NULL",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
