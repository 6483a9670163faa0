//! Database operations for `refund_requests`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefundRow {
    pub id: i64,
    pub public_id: Uuid,
    pub order_id: i64,
    pub order_public_id: Uuid,
    pub user_id: i64,
    pub order_item_id: Option<i64>,
    pub amount: Decimal,
    pub reason: String,
    pub status: String,
    pub admin_note: Option<String>,
    pub provider_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewRefund<'a> {
    pub order_id: i64,
    pub user_id: i64,
    pub order_item_id: Option<i64>,
    pub amount: Decimal,
    pub reason: &'a str,
}

const REFUND_COLUMNS: &str = "r.id, r.public_id, r.order_id, \
     (SELECT o.public_id FROM orders o WHERE o.id = r.order_id) AS order_public_id, \
     r.user_id, r.order_item_id, r.amount, r.reason, r.status, r.admin_note, \
     r.provider_refund_id, r.created_at, r.updated_at, r.resolved_at";

// Statuses that still count against an order's refundable balance.
const RESERVING_STATUSES: &str = "('pending', 'approved', 'processed')";

/// Files a refund request, refusing amounts above the order's remaining
/// refundable balance. The order row is locked so concurrent requests cannot
/// over-commit.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order is missing, or
/// [`DbError::Conflict`] if `amount` exceeds the remaining balance.
pub async fn create_refund_request(
    pool: &PgPool,
    refund: &NewRefund<'_>,
) -> Result<RefundRow, DbError> {
    let mut tx = pool.begin().await?;

    let total: Option<Decimal> =
        sqlx::query_scalar("SELECT total FROM orders WHERE id = $1 FOR UPDATE")
            .bind(refund.order_id)
            .fetch_optional(&mut *tx)
            .await?;
    let total = total.ok_or(DbError::NotFound)?;

    let reserved: Decimal = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(amount), 0) FROM refund_requests \
         WHERE order_id = $1 AND status IN {RESERVING_STATUSES}"
    ))
    .bind(refund.order_id)
    .fetch_one(&mut *tx)
    .await?;

    let remaining = total - reserved;
    if refund.amount > remaining {
        return Err(DbError::Conflict(format!(
            "refund of {} exceeds the refundable balance of {}",
            refund.amount,
            remaining.max(Decimal::ZERO)
        )));
    }

    let row = sqlx::query_as::<_, RefundRow>(&format!(
        "INSERT INTO refund_requests AS r (order_id, user_id, order_item_id, amount, reason) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {REFUND_COLUMNS}"
    ))
    .bind(refund.order_id)
    .bind(refund.user_id)
    .bind(refund.order_item_id)
    .bind(refund.amount)
    .bind(refund.reason)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Sum of refunds that are pending, approved or processed for an order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn reserved_refund_total(pool: &PgPool, order_id: i64) -> Result<Decimal, DbError> {
    let total = sqlx::query_scalar::<_, Decimal>(&format!(
        "SELECT COALESCE(SUM(amount), 0) FROM refund_requests \
         WHERE order_id = $1 AND status IN {RESERVING_STATUSES}"
    ))
    .bind(order_id)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Sum of refunds actually paid back for an order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn refunded_total(pool: &PgPool, order_id: i64) -> Result<Decimal, DbError> {
    let total = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(amount), 0) FROM refund_requests \
         WHERE order_id = $1 AND status = 'processed'",
    )
    .bind(order_id)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_refund_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<Option<RefundRow>, DbError> {
    let row = sqlx::query_as::<_, RefundRow>(&format!(
        "SELECT {REFUND_COLUMNS} FROM refund_requests r WHERE r.public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Admin listing, optionally filtered by status, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_refunds(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<RefundRow>, DbError> {
    let rows = sqlx::query_as::<_, RefundRow>(&format!(
        "SELECT {REFUND_COLUMNS} FROM refund_requests r \
         WHERE ($1::text IS NULL OR r.status = $1) \
         ORDER BY r.created_at DESC, r.id DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(status)
    .bind(limit)
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_refunds_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<RefundRow>, DbError> {
    let rows = sqlx::query_as::<_, RefundRow>(&format!(
        "SELECT {REFUND_COLUMNS} FROM refund_requests r \
         WHERE r.user_id = $1 \
         ORDER BY r.created_at DESC, r.id DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Compare-and-set on a refund's status. Terminal statuses stamp
/// `resolved_at`.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the refund is no longer in `from`.
pub async fn resolve_refund(
    pool: &PgPool,
    refund_id: i64,
    from: &str,
    to: &str,
    admin_note: Option<&str>,
    provider_refund_id: Option<&str>,
) -> Result<RefundRow, DbError> {
    let row = sqlx::query_as::<_, RefundRow>(&format!(
        "UPDATE refund_requests r SET \
             status             = $3, \
             admin_note         = COALESCE($4, r.admin_note), \
             provider_refund_id = COALESCE($5, r.provider_refund_id), \
             resolved_at        = CASE WHEN $3 IN ('rejected', 'processed', 'failed') \
                                       THEN NOW() ELSE r.resolved_at END, \
             updated_at         = NOW() \
         WHERE r.id = $1 AND r.status = $2 \
         RETURNING {REFUND_COLUMNS}"
    ))
    .bind(refund_id)
    .bind(from)
    .bind(to)
    .bind(admin_note)
    .bind(provider_refund_id)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| DbError::Conflict(format!("refund is no longer '{from}'")))
}
