//! Customer order history and cancellation.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oja_core::OrderStatus;
use oja_db::{OrderItemRow, OrderRow};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_db_error, normalize_limit, normalize_offset, parse_public_id, ApiError, ApiResponse,
    AppState, ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct OrderSummary {
    id: Uuid,
    status: String,
    items_subtotal: Decimal,
    tax_total: Decimal,
    service_fee: Decimal,
    total: Decimal,
    currency: String,
    payment_reference: String,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderItemView {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub variant_id: Option<i64>,
    pub variant_title: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetail {
    #[serde(flatten)]
    summary: OrderSummary,
    shipping: serde_json::Value,
    items: Vec<OrderItemView>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<OrderRow> for OrderSummary {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.public_id,
            status: row.status,
            items_subtotal: row.items_subtotal,
            tax_total: row.tax_total,
            service_fee: row.service_fee,
            total: row.total,
            currency: row.currency,
            payment_reference: row.payment_reference,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<OrderItemRow> for OrderItemView {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            variant_id: row.variant_id,
            variant_title: row.variant_title,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

pub(super) fn order_detail(order: OrderRow, items: Vec<OrderItemRow>) -> OrderDetail {
    let shipping = order.shipping.clone();
    OrderDetail {
        summary: order.into(),
        shipping,
        items: items.into_iter().map(OrderItemView::from).collect(),
    }
}

/// Parses an order's stored status; an unknown value is a server error.
pub(super) fn order_status(request_id: &str, order: &OrderRow) -> Result<OrderStatus, ApiError> {
    order.status.parse::<OrderStatus>().map_err(|e| {
        tracing::error!(error = %e, order_id = order.id, "order has unknown status");
        ApiError::new(request_id, "internal_error", "order is in an unknown state")
    })
}

/// Loads one of the caller's orders by public id.
pub(super) async fn load_user_order(
    state: &AppState,
    request_id: &str,
    user: &CurrentUser,
    raw_id: &str,
) -> Result<OrderRow, ApiError> {
    let public_id = parse_public_id(request_id, raw_id)?;
    oja_db::get_order_for_user(&state.pool, user.user_id, public_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", "order not found"))
}

pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<OrderSummary>>>, ApiError> {
    let rows = oja_db::list_orders_for_user(
        &state.pool,
        user.user_id,
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(OrderSummary::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let order = load_user_order(&state, &req_id.0, &user, &id).await?;
    let items = oja_db::list_order_items(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: order_detail(order, items),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/orders/{id}/cancel — cancel an unpaid order and release stock.
pub(super) async fn cancel_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let rid = &req_id.0;
    let order = load_user_order(&state, rid, &user, &id).await?;

    if order_status(rid, &order)? != OrderStatus::PendingPayment {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("order is {}; only unpaid orders can be cancelled", order.status),
        ));
    }

    let cancelled = oja_db::cancel_pending_order(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !cancelled {
        return Err(ApiError::new(
            rid,
            "conflict",
            "order changed state while cancelling; refresh and retry",
        ));
    }
    tracing::info!(order_id = order.id, user_id = user.user_id, "order cancelled by customer");

    let order = oja_db::get_order_by_id(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "order not found"))?;
    let items = oja_db::list_order_items(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: order_detail(order, items),
        meta: ResponseMeta::new(req_id.0),
    }))
}
