//! Database operations for the `suppliers` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `suppliers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplierRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub bank_code: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SUPPLIER_COLUMNS: &str = "id, public_id, user_id, name, slug, bank_code, account_number, \
                                account_name, is_active, created_at, updated_at";

/// Returns the active supplier linked to a user account, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_supplier_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<SupplierRow>, DbError> {
    let row = sqlx::query_as::<_, SupplierRow>(&format!(
        "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE user_id = $1 AND is_active = true"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Stores a resolved payout account on the supplier.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the supplier does not exist.
pub async fn update_supplier_bank_account(
    pool: &PgPool,
    supplier_id: i64,
    bank_code: &str,
    account_number: &str,
    account_name: &str,
) -> Result<SupplierRow, DbError> {
    let row = sqlx::query_as::<_, SupplierRow>(&format!(
        "UPDATE suppliers SET \
             bank_code = $2, account_number = $3, account_name = $4, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {SUPPLIER_COLUMNS}"
    ))
    .bind(supplier_id)
    .bind(bank_code)
    .bind(account_number)
    .bind(account_name)
    .fetch_optional(pool)
    .await?;
    row.ok_or(DbError::NotFound)
}

/// Links an existing supplier to a user account (used by the CLI).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no supplier has that slug.
pub async fn link_supplier_user(pool: &PgPool, slug: &str, user_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE suppliers SET user_id = $2, updated_at = NOW() WHERE slug = $1",
    )
    .bind(slug)
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
