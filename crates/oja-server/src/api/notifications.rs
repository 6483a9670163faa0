use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use oja_db::NotificationRow;

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_db_error, normalize_limit, normalize_offset, parse_public_id, ApiError, ApiResponse,
    AppState, ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct NotificationItem {
    id: Uuid,
    kind: String,
    title: String,
    body: String,
    data: serde_json::Value,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationItem {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.public_id,
            kind: row.kind,
            title: row.title,
            body: row.body,
            data: row.data,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct NotificationQuery {
    pub unread: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct UnreadCount {
    unread: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct MarkedRead {
    updated: u64,
}

/// Best-effort in-app notification; failures are logged, never surfaced.
pub(super) async fn notify(
    pool: &PgPool,
    user_id: i64,
    kind: &str,
    title: &str,
    body: &str,
    data: serde_json::Value,
) {
    let notification = oja_db::NewNotification {
        user_id,
        kind,
        title,
        body,
        data,
    };
    if let Err(e) = oja_db::insert_notification(pool, &notification).await {
        tracing::warn!(error = %e, user_id, kind, "failed to store notification");
    }
}

pub(super) async fn list_notifications(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<Vec<NotificationItem>>>, ApiError> {
    let rows = oja_db::list_notifications(
        &state.pool,
        user.user_id,
        query.unread.unwrap_or(false),
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(NotificationItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn unread_count(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UnreadCount>>, ApiError> {
    let unread = oja_db::count_unread(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: UnreadCount { unread },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn mark_read(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NotificationItem>>, ApiError> {
    let public_id = parse_public_id(&req_id.0, &id)?;
    let row = oja_db::mark_read(&state.pool, user.user_id, public_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn mark_all_read(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MarkedRead>>, ApiError> {
    let updated = oja_db::mark_all_read(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: MarkedRead { updated },
        meta: ResponseMeta::new(req_id.0),
    }))
}
