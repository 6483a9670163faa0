//! Database operations for `user_sessions`.
//!
//! Only the salted hash of a bearer token is stored; the raw token never
//! reaches the database.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `user_sessions` table (without the token hash).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// An active session joined with the user it belongs to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionUser {
    pub session_id: i64,
    pub session_public_id: Uuid,
    pub last_seen_at: DateTime<Utc>,
    pub user_id: i64,
    pub user_public_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

/// Inserts a new session.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_session(
    pool: &PgPool,
    user_id: i64,
    token_hash: &str,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<SessionRow, DbError> {
    let row = sqlx::query_as::<_, SessionRow>(
        "INSERT INTO user_sessions (user_id, token_hash, user_agent, ip_address, expires_at) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, public_id, user_id, user_agent, ip_address, created_at, last_seen_at, \
                   expires_at, revoked_at",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(user_agent)
    .bind(ip_address)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Looks up a live (unrevoked, unexpired) session for an active user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_active_session(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<SessionUser>, DbError> {
    let row = sqlx::query_as::<_, SessionUser>(
        "SELECT s.id AS session_id, s.public_id AS session_public_id, s.last_seen_at, \
                u.id AS user_id, u.public_id AS user_public_id, u.email, u.full_name, u.role \
         FROM user_sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token_hash = $1 \
           AND s.revoked_at IS NULL \
           AND s.expires_at > NOW() \
           AND u.is_active = true",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Bumps `last_seen_at`, at most once a minute per session.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_session(pool: &PgPool, session_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE user_sessions SET last_seen_at = NOW() \
         WHERE id = $1 AND last_seen_at < NOW() - INTERVAL '1 minute'",
    )
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Lists a user's live sessions, most recently used first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sessions_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<SessionRow>, DbError> {
    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT id, public_id, user_id, user_agent, ip_address, created_at, last_seen_at, \
                expires_at, revoked_at \
         FROM user_sessions \
         WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW() \
         ORDER BY last_seen_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Revokes one of the user's own sessions. Returns `false` if no live
/// session with that id belongs to the user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn revoke_session(
    pool: &PgPool,
    user_id: i64,
    session_public_id: Uuid,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE user_sessions SET revoked_at = NOW() \
         WHERE public_id = $1 AND user_id = $2 AND revoked_at IS NULL",
    )
    .bind(session_public_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes sessions that were revoked or expired before `cutoff`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_stale_sessions(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM user_sessions \
         WHERE COALESCE(revoked_at, expires_at) < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
