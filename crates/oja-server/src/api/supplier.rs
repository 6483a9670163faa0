//! Supplier portal: purchase orders, offers and payout bank account.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oja_core::orders::rollup_order_status;
use oja_core::pricing::round_money;
use oja_core::validation::validate_account_number;
use oja_core::{OrderStatus, PurchaseOrderStatus, Role};
use oja_db::{OfferRow, PurchaseOrderRow, SupplierRow};
use oja_paystack::PaystackError;

use crate::middleware::{CurrentUser, RequestId};

use super::notifications::notify;
use super::orders::order_status;
use super::{
    map_db_error, map_paystack_error, normalize_limit, normalize_offset, parse_public_id,
    require_paystack, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct PurchaseOrderQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OfferUpsert {
    pub product_id: i64,
    #[serde(default)]
    pub variant_id: Option<i64>,
    pub price: Decimal,
    pub available_qty: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(super) struct BankAccountUpdate {
    pub bank_code: String,
    pub account_number: String,
}

#[derive(Debug, Serialize)]
pub(super) struct PurchaseOrderItem {
    id: Uuid,
    order_id: Uuid,
    status: String,
    supplier_subtotal: Decimal,
    payout_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct PurchaseOrderDetail {
    #[serde(flatten)]
    purchase_order: PurchaseOrderItem,
    shipping: serde_json::Value,
    items: Vec<SupplierLine>,
}

/// An order line as the supplier sees it: their cost, not the customer price.
#[derive(Debug, Serialize)]
pub(super) struct SupplierLine {
    product_id: i64,
    product_name: String,
    variant_id: Option<i64>,
    variant_title: Option<String>,
    quantity: i32,
    unit_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct OfferItem {
    id: i64,
    kind: &'static str,
    product_id: i64,
    variant_id: Option<i64>,
    price: Decimal,
    available_qty: i32,
    is_active: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct BankAccountItem {
    bank_code: Option<String>,
    account_number: Option<String>,
    account_name: Option<String>,
}

impl From<PurchaseOrderRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderRow) -> Self {
        Self {
            id: row.public_id,
            order_id: row.order_public_id,
            status: row.status,
            supplier_subtotal: row.supplier_subtotal,
            payout_status: row.payout_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<OfferRow> for OfferItem {
    fn from(row: OfferRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind().as_str(),
            product_id: row.product_id,
            variant_id: row.variant_id,
            price: row.price,
            available_qty: row.available_qty,
            is_active: row.is_active,
        }
    }
}

/// The supplier linked to the caller; other roles get 403.
async fn resolve_supplier(
    state: &AppState,
    request_id: &str,
    user: &CurrentUser,
) -> Result<SupplierRow, ApiError> {
    if user.role != Role::Supplier {
        return Err(ApiError::new(
            request_id,
            "forbidden",
            "supplier access required",
        ));
    }
    oja_db::get_supplier_for_user(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                request_id,
                "forbidden",
                "account is not linked to an active supplier",
            )
        })
}

async fn load_purchase_order(
    state: &AppState,
    request_id: &str,
    supplier: &SupplierRow,
    raw_id: &str,
) -> Result<PurchaseOrderRow, ApiError> {
    let public_id = parse_public_id(request_id, raw_id)?;
    oja_db::get_purchase_order_for_supplier(&state.pool, supplier.id, public_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", "purchase order not found"))
}

fn parse_po_status(request_id: &str, raw: &str) -> Result<PurchaseOrderStatus, ApiError> {
    raw.trim()
        .parse::<PurchaseOrderStatus>()
        .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string()))
}

pub(super) async fn list_purchase_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PurchaseOrderQuery>,
) -> Result<Json<ApiResponse<Vec<PurchaseOrderItem>>>, ApiError> {
    let rid = &req_id.0;
    let supplier = resolve_supplier(&state, rid, &user).await?;
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(parse_po_status(rid, raw)?),
        None => None,
    };

    let rows = oja_db::list_purchase_orders_for_supplier(
        &state.pool,
        supplier.id,
        status.map(PurchaseOrderStatus::as_str),
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PurchaseOrderItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_purchase_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PurchaseOrderDetail>>, ApiError> {
    let rid = &req_id.0;
    let supplier = resolve_supplier(&state, rid, &user).await?;
    let po = load_purchase_order(&state, rid, &supplier, &id).await?;

    let order = oja_db::get_order_by_id(&state.pool, po.order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "purchase order not found"))?;
    if order.paid_at.is_none() {
        return Err(ApiError::new(rid, "not_found", "purchase order not found"));
    }
    let items = oja_db::list_order_items(&state.pool, po.order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let lines = items
        .into_iter()
        .filter(|item| item.purchase_order_id == po.id)
        .map(|item| SupplierLine {
            product_id: item.product_id,
            product_name: item.product_name,
            variant_id: item.variant_id,
            variant_title: item.variant_title,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
        })
        .collect();

    Ok(Json(ApiResponse {
        data: PurchaseOrderDetail {
            purchase_order: po.into(),
            shipping: order.shipping,
            items: lines,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/supplier/purchase-orders/{id}/status
///
/// Applies a validated PO transition, then rolls the customer order status
/// forward and tells the customer when it changed.
pub(super) async fn update_purchase_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<ApiResponse<PurchaseOrderItem>>, ApiError> {
    let rid = &req_id.0;
    let supplier = resolve_supplier(&state, rid, &user).await?;
    let po = load_purchase_order(&state, rid, &supplier, &id).await?;
    let target = parse_po_status(rid, &body.status)?;
    let current = parse_po_status(rid, &po.status)?;

    let order = oja_db::get_order_by_id(&state.pool, po.order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "purchase order not found"))?;
    if order.paid_at.is_none() {
        return Err(ApiError::new(rid, "conflict", "order has not been paid"));
    }
    if !current.can_transition(target) {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("cannot move purchase order from {current} to {target}"),
        ));
    }

    let updated =
        oja_db::update_purchase_order_status(&state.pool, po.id, current.as_str(), target.as_str())
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(
        purchase_order_id = po.id,
        supplier_id = supplier.id,
        from = %current,
        to = %target,
        "purchase order status changed"
    );

    let statuses: Vec<PurchaseOrderStatus> =
        oja_db::list_purchase_order_statuses(&state.pool, order.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
    let order_current = order_status(rid, &order)?;
    let next = rollup_order_status(order_current, &statuses);
    if next != order_current {
        oja_db::set_order_status(&state.pool, order.id, next)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        tracing::info!(
            order_id = order.id,
            from = %order_current,
            to = %next,
            "order status rolled up"
        );
        notify(
            &state.pool,
            order.user_id,
            "order_status",
            &order_status_title(next),
            &format!("Order {} is now {next}.", order.payment_reference),
            serde_json::json!({ "order_id": order.public_id, "status": next.as_str() }),
        )
        .await;
    }

    Ok(Json(ApiResponse {
        data: updated.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn order_status_title(status: OrderStatus) -> String {
    match status {
        OrderStatus::Processing => "Your order is being prepared".to_owned(),
        OrderStatus::Shipped => "Your order is on its way".to_owned(),
        OrderStatus::Delivered => "Your order was delivered".to_owned(),
        OrderStatus::Cancelled => "Your order was cancelled".to_owned(),
        other => format!("Order {other}"),
    }
}

/// PUT /api/v1/supplier/offers — create or update one of the caller's offers.
pub(super) async fn upsert_offer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<OfferUpsert>,
) -> Result<Json<ApiResponse<OfferItem>>, ApiError> {
    let rid = &req_id.0;
    let supplier = resolve_supplier(&state, rid, &user).await?;

    if body.price <= Decimal::ZERO || round_money(body.price) != body.price {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "price must be positive with at most two decimal places",
        ));
    }
    if body.available_qty < 0 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "available_qty cannot be negative",
        ));
    }

    let product = oja_db::get_product_by_id(&state.pool, body.product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "product not found"))?;

    let row = match body.variant_id {
        Some(variant_id) => {
            let variants = oja_db::list_variants(&state.pool, product.id)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            if !variants.iter().any(|v| v.id == variant_id) {
                return Err(ApiError::new(
                    rid,
                    "not_found",
                    format!("variant {variant_id} not found on product {}", product.id),
                ));
            }
            oja_db::upsert_variant_offer(
                &state.pool,
                supplier.id,
                variant_id,
                body.price,
                body.available_qty,
                body.is_active,
            )
            .await
        }
        None => {
            oja_db::upsert_product_offer(
                &state.pool,
                supplier.id,
                product.id,
                body.price,
                body.available_qty,
                body.is_active,
            )
            .await
        }
    }
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        supplier_id = supplier.id,
        offer_id = row.id,
        kind = row.kind().as_str(),
        price = %row.price,
        available_qty = row.available_qty,
        "offer upserted"
    );

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PUT /api/v1/supplier/bank-account — resolve the account name with Paystack
/// and store it as the payout destination.
pub(super) async fn update_bank_account(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<BankAccountUpdate>,
) -> Result<Json<ApiResponse<BankAccountItem>>, ApiError> {
    let rid = &req_id.0;
    let supplier = resolve_supplier(&state, rid, &user).await?;

    let account_number = validate_account_number(&body.account_number)
        .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?;
    let bank_code = body.bank_code.trim();
    if bank_code.is_empty() || !bank_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "bank_code must be a numeric bank code",
        ));
    }

    let paystack = require_paystack(&state, rid)?;
    let resolved = paystack
        .resolve_account(&account_number, bank_code)
        .await
        .map_err(|e| match e {
            PaystackError::Api(message) => ApiError::new(
                rid,
                "validation_error",
                format!("could not verify bank account: {message}"),
            ),
            other => map_paystack_error(rid.clone(), &other),
        })?;

    let row = oja_db::update_supplier_bank_account(
        &state.pool,
        supplier.id,
        bank_code,
        &resolved.account_number,
        &resolved.account_name,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(supplier_id = supplier.id, bank_code, "supplier bank account updated");

    Ok(Json(ApiResponse {
        data: BankAccountItem {
            bank_code: row.bank_code,
            account_number: row.account_number,
            account_name: row.account_name,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
