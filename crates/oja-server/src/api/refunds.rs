//! Refund requests (customers) and their resolution (admins).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oja_core::{pricing::round_money, to_kobo, OrderStatus, RefundStatus};
use oja_db::{OrderRow, RefundRow};
use oja_paystack::PaystackError;

use crate::middleware::{CurrentUser, RequestId};

use super::notifications::notify;
use super::orders::{load_user_order, order_status};
use super::{
    map_db_error, map_paystack_error, normalize_limit, normalize_offset, parse_public_id,
    require_paystack, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct RefundRequestBody {
    /// Defaults to the item's line total, or to the whole unrefunded balance.
    pub amount: Option<Decimal>,
    pub reason: String,
    pub order_item_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResolveRefundBody {
    pub approve: bool,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RefundListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct RefundItem {
    id: Uuid,
    order_id: Uuid,
    order_item_id: Option<i64>,
    amount: Decimal,
    reason: String,
    status: String,
    admin_note: Option<String>,
    provider_refund_id: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<RefundRow> for RefundItem {
    fn from(row: RefundRow) -> Self {
        Self {
            id: row.public_id,
            order_id: row.order_public_id,
            order_item_id: row.order_item_id,
            amount: row.amount,
            reason: row.reason,
            status: row.status,
            admin_note: row.admin_note,
            provider_refund_id: row.provider_refund_id,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

/// Paid orders may be refunded, including paid orders whose suppliers all
/// cancelled.
fn accepts_refunds(status: OrderStatus, order: &OrderRow) -> bool {
    status.is_refundable() || (status == OrderStatus::Cancelled && order.paid_at.is_some())
}

fn validate_amount(request_id: &str, amount: Decimal) -> Result<Decimal, ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            "amount must be greater than zero",
        ));
    }
    if round_money(amount) != amount {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            "amount must have at most two decimal places",
        ));
    }
    Ok(amount)
}

/// POST /api/v1/orders/{id}/refunds
pub(super) async fn request_refund(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<RefundRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<RefundItem>>), ApiError> {
    let rid = &req_id.0;
    let order = load_user_order(&state, rid, &user, &id).await?;

    let status = order_status(rid, &order)?;
    if !accepts_refunds(status, &order) {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("order is {}; refunds are only possible on paid orders", order.status),
        ));
    }

    let reason = body.reason.trim();
    if reason.chars().count() < 3 || reason.chars().count() > 1000 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "reason must be 3-1000 characters",
        ));
    }

    let item_total = match body.order_item_id {
        Some(item_id) => {
            let items = oja_db::list_order_items(&state.pool, order.id)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            let total = items
                .iter()
                .find(|i| i.id == item_id)
                .map(|i| i.line_total)
                .ok_or_else(|| ApiError::new(rid, "not_found", "order item not found"))?;
            Some(total)
        }
        None => None,
    };

    let amount = match (body.amount, item_total) {
        (Some(amount), _) => validate_amount(rid, amount)?,
        (None, Some(line_total)) => line_total,
        (None, None) => {
            let reserved = oja_db::reserved_refund_total(&state.pool, order.id)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            validate_amount(rid, order.total - reserved)
                .map_err(|_| ApiError::new(rid, "conflict", "order is already fully refunded"))?
        }
    };

    let row = oja_db::create_refund_request(
        &state.pool,
        &oja_db::NewRefund {
            order_id: order.id,
            user_id: user.user_id,
            order_item_id: body.order_item_id,
            amount,
            reason,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        order_id = order.id,
        refund_id = row.id,
        amount = %row.amount,
        "refund requested"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: row.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/refunds — the caller's refund requests.
pub(super) async fn list_my_refunds(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<RefundListQuery>,
) -> Result<Json<ApiResponse<Vec<RefundItem>>>, ApiError> {
    let rows = oja_db::list_refunds_for_user(
        &state.pool,
        user.user_id,
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RefundItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/admin/refunds?status=
pub(super) async fn list_all_refunds(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RefundListQuery>,
) -> Result<Json<ApiResponse<Vec<RefundItem>>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<RefundStatus>()
                .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?,
        ),
        None => None,
    };

    let rows = oja_db::list_refunds(
        &state.pool,
        status.map(RefundStatus::as_str),
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RefundItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/admin/refunds/{id}/resolve
///
/// Approval claims the refund (`pending → approved`) before calling Paystack,
/// so a double click cannot pay out twice. Only an outright Paystack rejection
/// marks it `failed` and releases the reserved amount; when the outcome is
/// unknown it stays `approved`.
pub(super) async fn resolve_refund(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<ResolveRefundBody>,
) -> Result<Json<ApiResponse<RefundItem>>, ApiError> {
    let rid = &req_id.0;
    let public_id = parse_public_id(rid, &id)?;
    let note = body
        .note
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let refund = oja_db::get_refund_by_public_id(&state.pool, public_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "refund not found"))?;
    if refund.status != RefundStatus::Pending.as_str() {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("refund is already {}", refund.status),
        ));
    }

    let pending = RefundStatus::Pending.as_str();
    if !body.approve {
        let row = oja_db::resolve_refund(
            &state.pool,
            refund.id,
            pending,
            RefundStatus::Rejected.as_str(),
            note,
            None,
        )
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
        notify(
            &state.pool,
            row.user_id,
            "refund_rejected",
            "Refund declined",
            note.unwrap_or("Your refund request was declined."),
            serde_json::json!({ "refund_id": row.public_id, "order_id": row.order_public_id }),
        )
        .await;
        return Ok(Json(ApiResponse {
            data: row.into(),
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let paystack = require_paystack(&state, rid)?;
    let order = oja_db::get_order_by_id(&state.pool, refund.order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "order not found"))?;

    let approved = RefundStatus::Approved.as_str();
    oja_db::resolve_refund(&state.pool, refund.id, pending, approved, note, None)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let charge_reference = oja_db::get_successful_payment_for_order(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .map_or_else(|| order.payment_reference.clone(), |p| p.reference);

    let provider = match paystack
        .create_refund(&charge_reference, Some(to_kobo(refund.amount)))
        .await
    {
        Ok(provider) => provider,
        Err(e) if refund_failure_is_final(&e) => {
            if let Err(db) = oja_db::resolve_refund(
                &state.pool,
                refund.id,
                approved,
                RefundStatus::Failed.as_str(),
                note,
                None,
            )
            .await
            {
                tracing::error!(error = %db, refund_id = refund.id, "failed to mark refund failed");
            }
            return Err(map_paystack_error(rid.clone(), &e));
        }
        Err(e) => {
            // Paystack may have accepted it; the refund stays approved and reserved.
            tracing::error!(
                error = %e,
                refund_id = refund.id,
                order_id = order.id,
                reference = %charge_reference,
                "refund outcome unknown; reconcile with paystack"
            );
            return Err(map_paystack_error(rid.clone(), &e));
        }
    };

    let provider_id = provider.id.to_string();
    let row = match oja_db::resolve_refund(
        &state.pool,
        refund.id,
        approved,
        RefundStatus::Processed.as_str(),
        note,
        Some(&provider_id),
    )
    .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!(
                error = %e,
                refund_id = refund.id,
                provider_refund_id = %provider_id,
                "paystack refunded but the refund could not be marked processed"
            );
            return Err(map_db_error(rid.clone(), &e));
        }
    };

    tracing::info!(
        refund_id = row.id,
        order_id = order.id,
        amount = %row.amount,
        provider_refund_id = %provider_id,
        "refund processed"
    );

    mark_order_refunded_if_settled(&state, &order).await;
    notify(
        &state.pool,
        row.user_id,
        "refund_processed",
        "Refund on its way",
        &format!(
            "NGN {} for order {} has been sent back to your payment method.",
            row.amount, order.payment_reference
        ),
        serde_json::json!({ "refund_id": row.public_id, "order_id": row.order_public_id }),
    )
    .await;

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Whether a `create_refund` error proves Paystack did not refund. Transport
/// and decoding failures leave the outcome unknown.
fn refund_failure_is_final(error: &PaystackError) -> bool {
    matches!(
        error,
        PaystackError::Api(_) | PaystackError::InvalidBaseUrl { .. }
    )
}

/// Moves the order to `refunded` once processed refunds cover its total.
async fn mark_order_refunded_if_settled(state: &AppState, order: &OrderRow) {
    let refunded = match oja_db::refunded_total(&state.pool, order.id).await {
        Ok(total) => total,
        Err(e) => {
            tracing::warn!(error = %e, order_id = order.id, "failed to total refunds");
            return;
        }
    };
    if refunded < order.total {
        return;
    }
    let Ok(current) = order.status.parse::<OrderStatus>() else {
        return;
    };
    if !current.can_transition(OrderStatus::Refunded) {
        return;
    }
    if let Err(e) = oja_db::set_order_status(&state.pool, order.id, OrderStatus::Refunded).await {
        tracing::warn!(error = %e, order_id = order.id, "failed to mark order refunded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_must_be_positive_kobo() {
        assert!(validate_amount("req", Decimal::new(1_000, 2)).is_ok());
        assert!(validate_amount("req", Decimal::ZERO).is_err());
        assert!(validate_amount("req", Decimal::new(-5, 0)).is_err());
        assert!(validate_amount("req", Decimal::new(10_005, 3)).is_err());
    }

    #[test]
    fn only_provider_rejections_fail_a_refund() {
        assert!(refund_failure_is_final(&PaystackError::Api(
            "Transaction has been fully reversed".to_owned()
        )));

        let garbled = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!refund_failure_is_final(&PaystackError::Deserialize {
            context: "refund".to_owned(),
            source: garbled,
        }));
    }
}
