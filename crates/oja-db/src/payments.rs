//! Database operations for the `payments` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `payments` table (without the raw gateway payload).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub order_id: i64,
    pub reference: String,
    pub provider: String,
    pub amount_kobo: i64,
    pub status: String,
    pub authorization_url: Option<String>,
    pub access_code: Option<String>,
    pub gateway_response: Option<String>,
    pub channel: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a verify call or webhook for one reference.
#[derive(Debug, Clone)]
pub struct PaymentUpdate<'a> {
    pub reference: &'a str,
    pub status: &'a str,
    pub amount_kobo: i64,
    pub gateway_response: Option<&'a str>,
    pub channel: Option<&'a str>,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

const PAYMENT_COLUMNS: &str = "id, order_id, reference, provider, amount_kobo, status, \
     authorization_url, access_code, gateway_response, channel, paid_at, created_at, updated_at";

/// Records (or refreshes) an initialised transaction for an order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_initialized_payment(
    pool: &PgPool,
    order_id: i64,
    reference: &str,
    amount_kobo: i64,
    authorization_url: &str,
    access_code: &str,
) -> Result<PaymentRow, DbError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "INSERT INTO payments (order_id, reference, amount_kobo, authorization_url, access_code) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (reference) DO UPDATE SET \
             authorization_url = EXCLUDED.authorization_url, \
             access_code       = EXCLUDED.access_code, \
             updated_at        = NOW() \
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(order_id)
    .bind(reference)
    .bind(amount_kobo)
    .bind(authorization_url)
    .bind(access_code)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Stores a gateway result. A payment already marked `success` is never
/// downgraded by a later, stale result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_payment_result(
    pool: &PgPool,
    order_id: i64,
    update: &PaymentUpdate<'_>,
) -> Result<PaymentRow, DbError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "INSERT INTO payments AS p \
             (order_id, reference, amount_kobo, status, gateway_response, channel, paid_at, raw) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (reference) DO UPDATE SET \
             status           = CASE WHEN p.status = 'success' \
                                     THEN p.status ELSE EXCLUDED.status END, \
             amount_kobo      = CASE WHEN p.status = 'success' \
                                     THEN p.amount_kobo ELSE EXCLUDED.amount_kobo END, \
             gateway_response = COALESCE(EXCLUDED.gateway_response, p.gateway_response), \
             channel          = COALESCE(EXCLUDED.channel, p.channel), \
             paid_at          = COALESCE(p.paid_at, EXCLUDED.paid_at), \
             raw              = EXCLUDED.raw, \
             updated_at       = NOW() \
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(order_id)
    .bind(update.reference)
    .bind(update.amount_kobo)
    .bind(update.status)
    .bind(update.gateway_response)
    .bind(update.channel)
    .bind(update.paid_at)
    .bind(&update.raw)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// The most recent checkout attempt for an order, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_payment_for_order(
    pool: &PgPool,
    order_id: i64,
) -> Result<Option<PaymentRow>, DbError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT 1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_payments_for_order(pool: &PgPool, order_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// The charge that paid an order, if one succeeded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_successful_payment_for_order(
    pool: &PgPool,
    order_id: i64,
) -> Result<Option<PaymentRow>, DbError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 AND status = 'success' \
         ORDER BY paid_at NULLS LAST, id LIMIT 1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
