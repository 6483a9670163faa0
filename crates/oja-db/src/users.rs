//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, public_id, email, password_hash, full_name, phone, role, \
                            is_active, created_at, updated_at";

/// Inserts a user. `email` must already be normalised.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the email is taken, or [`DbError::Sqlx`]
/// for any other failure.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    full_name: &str,
    phone: Option<&str>,
    role: &str,
) -> Result<UserRow, DbError> {
    let result = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, password_hash, full_name, phone, role) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(password_hash)
    .bind(full_name)
    .bind(phone)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(DbError::from);

    match result {
        Err(e) if e.is_unique_violation() => Err(DbError::Conflict(
            "an account with that email already exists".to_string(),
        )),
        other => other,
    }
}

/// Returns an active user by normalised email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = true"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns a user by internal id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_id(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Sparse profile update.
///
/// `phone`: `None` keeps the current value, `Some(None)` clears it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user does not exist.
#[allow(clippy::option_option)]
pub async fn update_user_profile(
    pool: &PgPool,
    user_id: i64,
    full_name: Option<&str>,
    phone: Option<Option<&str>>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET \
             full_name  = COALESCE($2, full_name), \
             phone      = CASE WHEN $3 THEN $4 ELSE phone END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(full_name)
    .bind(phone.is_some())
    .bind(phone.flatten())
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Changes a user's role (`customer`, `supplier` or `admin`).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user does not exist.
pub async fn set_user_role(pool: &PgPool, user_id: i64, role: &str) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET role = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}
