//! Database operations for in-app `notifications`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub user_id: i64,
    pub kind: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub data: serde_json::Value,
}

const NOTIFICATION_COLUMNS: &str =
    "id, public_id, user_id, kind, title, body, data, read_at, created_at";

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_notification(
    pool: &PgPool,
    notification: &NewNotification<'_>,
) -> Result<NotificationRow, DbError> {
    let row = sqlx::query_as::<_, NotificationRow>(&format!(
        "INSERT INTO notifications (user_id, kind, title, body, data) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(notification.title)
    .bind(notification.body)
    .bind(&notification.data)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Lists a user's notifications, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_notifications(
    pool: &PgPool,
    user_id: i64,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<NotificationRow>, DbError> {
    let rows = sqlx::query_as::<_, NotificationRow>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3 OFFSET $4"
    ))
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_unread(pool: &PgPool, user_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Marks one of the user's notifications read. Already-read notifications
/// keep their original `read_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the notification does not belong to the
/// user.
pub async fn mark_read(
    pool: &PgPool,
    user_id: i64,
    public_id: Uuid,
) -> Result<NotificationRow, DbError> {
    let row = sqlx::query_as::<_, NotificationRow>(&format!(
        "UPDATE notifications SET read_at = COALESCE(read_at, NOW()) \
         WHERE public_id = $1 AND user_id = $2 \
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(public_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    row.ok_or(DbError::NotFound)
}

/// Returns how many notifications were newly marked read.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_all_read(pool: &PgPool, user_id: i64) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
