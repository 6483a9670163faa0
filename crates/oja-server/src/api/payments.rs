//! Paystack checkout: initialise, verify, and the `charge.success` webhook.
//!
//! Verify and webhook both end in [`settle_transaction`], which only moves an
//! order to `paid` once and only when the charged kobo amount matches the
//! order total.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use oja_core::orders::payment_attempt_reference;
use oja_core::{to_kobo, OrderStatus, PaymentStatus};
use oja_db::{DbError, OrderRow};
use oja_paystack::{InitializeRequest, Transaction, WebhookEvent, SIGNATURE_HEADER};

use crate::middleware::{CurrentUser, RequestId};

use super::notifications::notify;
use super::orders::{load_user_order, order_status};
use super::{
    map_db_error, map_paystack_error, require_paystack, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct InitializePaymentRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct InitializedPayment {
    reference: String,
    authorization_url: String,
    access_code: String,
    amount_kobo: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct PaymentResult {
    reference: String,
    outcome: Settlement,
    order_status: String,
}

#[derive(Debug, Serialize)]
pub(super) struct WebhookAck {
    received: bool,
    outcome: Option<Settlement>,
}

/// What settling one Paystack transaction did to its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum Settlement {
    /// This call moved the order to `paid`.
    Paid,
    /// An earlier verify or webhook already settled it.
    AlreadyPaid,
    /// Paystack reports the charge as not (yet) successful.
    NotSuccessful,
    /// Success for the wrong amount or currency; the payment is marked failed.
    AmountMismatch,
    /// Money arrived for an order that was cancelled or expired.
    OrderClosed,
}

/// Gateway status after checking the charged amount against the order.
pub(super) fn assess_transaction(order: &OrderRow, tx: &Transaction) -> PaymentStatus {
    let status = PaymentStatus::from_gateway(&tx.status);
    if status != PaymentStatus::Success {
        return status;
    }
    let currency_ok = tx
        .currency
        .as_deref()
        .is_none_or(|c| c.eq_ignore_ascii_case(&order.currency));
    if tx.amount == to_kobo(order.total) && currency_ok {
        PaymentStatus::Success
    } else {
        PaymentStatus::Failed
    }
}

/// Records the gateway result and, on a matching success, marks the order paid
/// and notifies the customer and each supplier.
pub(super) async fn settle_transaction(
    pool: &PgPool,
    order: &OrderRow,
    tx: &Transaction,
    raw: serde_json::Value,
) -> Result<Settlement, DbError> {
    let status = assess_transaction(order, tx);
    let mismatch = status == PaymentStatus::Failed
        && PaymentStatus::from_gateway(&tx.status) == PaymentStatus::Success;
    if mismatch {
        tracing::warn!(
            order_id = order.id,
            reference = %tx.reference,
            charged_kobo = tx.amount,
            expected_kobo = to_kobo(order.total),
            currency = ?tx.currency,
            "paystack amount does not match order total"
        );
    }

    oja_db::record_payment_result(
        pool,
        order.id,
        &oja_db::PaymentUpdate {
            reference: &tx.reference,
            status: status.as_str(),
            amount_kobo: tx.amount,
            gateway_response: tx.gateway_response.as_deref(),
            channel: tx.channel.as_deref(),
            paid_at: tx.paid_at,
            raw,
        },
    )
    .await?;

    if mismatch {
        return Ok(Settlement::AmountMismatch);
    }
    if status != PaymentStatus::Success {
        return Ok(Settlement::NotSuccessful);
    }

    if oja_db::mark_order_paid(pool, order.id).await? {
        tracing::info!(order_id = order.id, reference = %tx.reference, "order paid");
        notify_paid(pool, order).await;
        return Ok(Settlement::Paid);
    }

    let current = oja_db::get_order_by_id(pool, order.id)
        .await?
        .ok_or(DbError::NotFound)?;
    if current.paid_at.is_some() {
        Ok(Settlement::AlreadyPaid)
    } else {
        tracing::warn!(
            order_id = order.id,
            status = %current.status,
            reference = %tx.reference,
            "payment received for a closed order; refund required"
        );
        Ok(Settlement::OrderClosed)
    }
}

async fn notify_paid(pool: &PgPool, order: &OrderRow) {
    let data = serde_json::json!({
        "order_id": order.public_id,
        "reference": order.payment_reference,
    });
    notify(
        pool,
        order.user_id,
        "order_paid",
        "Payment received",
        &format!(
            "We received NGN {} for order {}.",
            order.total, order.payment_reference
        ),
        data.clone(),
    )
    .await;

    match oja_db::list_supplier_user_ids_for_order(pool, order.id).await {
        Ok(user_ids) => {
            for user_id in user_ids {
                notify(
                    pool,
                    user_id,
                    "purchase_order_created",
                    "New purchase order",
                    &format!(
                        "Order {} is paid and ready for you to confirm.",
                        order.payment_reference
                    ),
                    data.clone(),
                )
                .await;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, order_id = order.id, "failed to load supplier users");
        }
    }
}

/// POST /api/v1/payments/initialize — start (or resume) a Paystack checkout.
///
/// An open checkout for the current total is handed back as is; after an
/// abandoned or failed attempt a new reference is issued.
pub(super) async fn initialize_payment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<InitializePaymentRequest>,
) -> Result<Json<ApiResponse<InitializedPayment>>, ApiError> {
    let rid = &req_id.0;
    let paystack = require_paystack(&state, rid)?;
    let order = load_user_order(&state, rid, &user, &body.order_id).await?;

    if order_status(rid, &order)? != OrderStatus::PendingPayment {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("order is {}; nothing to pay", order.status),
        ));
    }
    let amount_kobo = to_kobo(order.total);

    let latest = oja_db::get_latest_payment_for_order(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if let Some(payment) = latest {
        if payment.status == PaymentStatus::Success.as_str() {
            return Err(ApiError::new(
                rid,
                "conflict",
                format!("payment {} already succeeded; verify it", payment.reference),
            ));
        }
        if payment.status == PaymentStatus::Initialized.as_str()
            && payment.amount_kobo == amount_kobo
        {
            if let (Some(url), Some(code)) = (payment.authorization_url, payment.access_code) {
                return Ok(Json(ApiResponse {
                    data: InitializedPayment {
                        reference: payment.reference,
                        authorization_url: url,
                        access_code: code,
                        amount_kobo,
                    },
                    meta: ResponseMeta::new(req_id.0),
                }));
            }
        }
    }

    // Paystack rejects a reused reference, so every new checkout gets its own.
    let attempts = oja_db::count_payments_for_order(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let reference = payment_attempt_reference(&order.payment_reference, attempts + 1);

    let request = InitializeRequest {
        email: user.email.clone(),
        amount: amount_kobo,
        reference: reference.clone(),
        currency: order.currency.clone(),
        callback_url: state.config.paystack_callback_url.clone(),
        metadata: serde_json::json!({
            "order_id": order.public_id,
            "customer": user.public_id,
        }),
    };
    let initialized = paystack
        .initialize_transaction(&request)
        .await
        .map_err(|e| map_paystack_error(rid.clone(), &e))?;

    oja_db::upsert_initialized_payment(
        &state.pool,
        order.id,
        &reference,
        amount_kobo,
        &initialized.authorization_url,
        &initialized.access_code,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(order_id = order.id, %reference, amount_kobo, "paystack checkout initialised");

    Ok(Json(ApiResponse {
        data: InitializedPayment {
            reference,
            authorization_url: initialized.authorization_url,
            access_code: initialized.access_code,
            amount_kobo,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/payments/verify/{reference} — ask Paystack and settle.
pub(super) async fn verify_payment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<PaymentResult>>, ApiError> {
    let rid = &req_id.0;
    let paystack = require_paystack(&state, rid)?;

    let reference = reference.trim();
    let order = oja_db::get_order_by_reference(&state.pool, reference)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .filter(|o| o.user_id == user.user_id)
        .ok_or_else(|| ApiError::new(rid, "not_found", "payment not found"))?;

    // The order's own reference stands for its latest checkout attempt.
    let reference = if reference == order.payment_reference {
        oja_db::get_latest_payment_for_order(&state.pool, order.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .map_or_else(|| order.payment_reference.clone(), |p| p.reference)
    } else {
        reference.to_owned()
    };

    let tx = paystack
        .verify_transaction(&reference)
        .await
        .map_err(|e| map_paystack_error(rid.clone(), &e))?;
    let raw = serde_json::json!({
        "source": "verify",
        "status": tx.status,
        "amount": tx.amount,
        "gateway_response": tx.gateway_response,
    });
    let outcome = settle_transaction(&state.pool, &order, &tx, raw)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let order_status = oja_db::get_order_by_id(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .map_or(order.status, |o| o.status);

    Ok(Json(ApiResponse {
        data: PaymentResult {
            reference,
            outcome,
            order_status,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/payments/webhook — Paystack event delivery.
///
/// Unknown references and non-charge events are acknowledged so Paystack
/// stops redelivering; database failures return 500 so it retries.
pub(super) async fn paystack_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let rid = &req_id.0;
    let secret = state
        .config
        .paystack_secret_key
        .as_deref()
        .ok_or_else(|| ApiError::new(rid, "payment_unavailable", "payments are not configured"))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !oja_paystack::verify_webhook_signature(secret, &body, signature) {
        tracing::warn!("paystack webhook rejected: bad signature");
        return Err(ApiError::new(rid, "unauthorized", "invalid webhook signature"));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::new(rid, "bad_request", "malformed webhook payload"))?;

    if event.event != "charge.success" {
        tracing::debug!(event = %event.event, "ignoring paystack webhook event");
        return Ok(Json(ApiResponse {
            data: WebhookAck {
                received: true,
                outcome: None,
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let tx = event
        .transaction()
        .map_err(|_| ApiError::new(rid, "bad_request", "malformed charge payload"))?;

    let order = oja_db::get_order_by_reference(&state.pool, &tx.reference)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let Some(order) = order else {
        tracing::warn!(reference = %tx.reference, "paystack webhook for unknown reference");
        return Ok(Json(ApiResponse {
            data: WebhookAck {
                received: true,
                outcome: None,
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    };

    let outcome = settle_transaction(&state.pool, &order, &tx, event.data.clone())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: WebhookAck {
            received: true,
            outcome: Some(outcome),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order(total: Decimal) -> OrderRow {
        OrderRow {
            id: 1,
            public_id: uuid::Uuid::new_v4(),
            user_id: 1,
            status: "pending_payment".to_owned(),
            items_subtotal: total,
            tax_total: Decimal::ZERO,
            service_fee: Decimal::ZERO,
            total,
            currency: "NGN".to_owned(),
            shipping: serde_json::json!({}),
            payment_reference: "OJA-TEST".to_owned(),
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tx(status: &str, amount: i64, currency: Option<&str>) -> Transaction {
        Transaction {
            id: Some(1),
            status: status.to_owned(),
            reference: "OJA-TEST".to_owned(),
            amount,
            currency: currency.map(ToOwned::to_owned),
            gateway_response: None,
            channel: None,
            paid_at: None,
            customer: None,
        }
    }

    #[test]
    fn matching_success_is_success() {
        let o = order(Decimal::new(185_550, 2));
        assert_eq!(
            assess_transaction(&o, &tx("success", 185_550, Some("NGN"))),
            PaymentStatus::Success
        );
    }

    #[test]
    fn short_payment_is_failed() {
        let o = order(Decimal::new(185_550, 2));
        assert_eq!(
            assess_transaction(&o, &tx("success", 185_500, Some("NGN"))),
            PaymentStatus::Failed
        );
    }

    #[test]
    fn foreign_currency_is_failed() {
        let o = order(Decimal::new(1_000, 0));
        assert_eq!(
            assess_transaction(&o, &tx("success", 100_000, Some("USD"))),
            PaymentStatus::Failed
        );
    }

    #[test]
    fn abandoned_passes_through() {
        let o = order(Decimal::new(1_000, 0));
        assert_eq!(
            assess_transaction(&o, &tx("abandoned", 100_000, None)),
            PaymentStatus::Abandoned
        );
    }
}
