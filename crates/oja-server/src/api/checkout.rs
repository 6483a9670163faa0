//! POST /api/v1/checkout — turn a cart into an unpaid order.
//!
//! The cart is re-quoted server-side; client prices are never trusted. Stock
//! is reserved inside the order transaction, so two shoppers racing for the
//! last unit get one order and one 409.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use oja_core::validation::normalize_ng_phone;

use crate::middleware::{CurrentUser, RequestId};

use super::cart::{build_quote, CartItemRequest};
use super::orders::{order_detail, OrderDetail};
use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutRequest {
    pub items: Vec<CartItemRequest>,
    pub shipping: ShippingAddress,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(super) struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub landmark: Option<String>,
}

fn required(request_id: &str, field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("shipping.{field} must be 1-{max} characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Trims every field and normalises the phone number to `+234…`.
pub(super) fn normalize_shipping(
    request_id: &str,
    shipping: &ShippingAddress,
) -> Result<ShippingAddress, ApiError> {
    let phone = normalize_ng_phone(&shipping.phone)
        .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string()))?;

    Ok(ShippingAddress {
        full_name: required(request_id, "full_name", &shipping.full_name, 120)?,
        phone,
        address_line1: required(request_id, "address_line1", &shipping.address_line1, 200)?,
        address_line2: optional(shipping.address_line2.as_deref()),
        city: required(request_id, "city", &shipping.city, 80)?,
        state: required(request_id, "state", &shipping.state, 80)?,
        landmark: optional(shipping.landmark.as_deref()),
    })
}

pub(super) async fn checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ApiError> {
    let rid = &req_id.0;

    if body.items.is_empty() {
        return Err(ApiError::new(rid, "validation_error", "cart is empty"));
    }
    let shipping = normalize_shipping(rid, &body.shipping)?;

    let priced = build_quote(&state.pool, rid, &body.items).await?;
    if !priced.quote.is_fulfillable {
        let short: Vec<String> = priced
            .quote
            .lines
            .iter()
            .filter(|l| l.shortfall > 0 || l.allocated_qty == 0)
            .map(|l| format!("product {} short by {}", l.product_id, l.shortfall))
            .collect();
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("not enough stock: {}", short.join(", ")),
        ));
    }

    let items: Vec<oja_db::NewOrderItem> = priced
        .quote
        .lines
        .iter()
        .flat_map(|line| {
            line.allocations.iter().map(move |a| oja_db::NewOrderItem {
                product_id: line.product_id,
                variant_id: line.variant_id,
                supplier_id: a.supplier_id,
                offer_id: a.offer_id,
                quantity: a.quantity,
                unit_cost: a.unit_cost,
                unit_price: a.unit_price,
                line_total: a.line_total,
            })
        })
        .collect();

    let reference = oja_core::orders::payment_reference();
    let shipping_json = serde_json::to_value(&shipping)
        .map_err(|_| ApiError::new(rid, "internal_error", "failed to encode shipping address"))?;

    let order = oja_db::create_order(
        &state.pool,
        &oja_db::NewOrder {
            user_id: user.user_id,
            items_subtotal: priced.quote.items_subtotal,
            tax_total: priced.quote.tax_total,
            service_fee: priced.quote.service_fee.total,
            total: priced.quote.total,
            shipping: shipping_json,
            payment_reference: &reference,
            items,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        order_id = order.id,
        user_id = user.user_id,
        total = %order.total,
        reference = %order.payment_reference,
        "order placed"
    );

    let items = oja_db::list_order_items(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: order_detail(order, items),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "  Ada Obi ".to_owned(),
            phone: "0803 123 4567".to_owned(),
            address_line1: "12 Allen Avenue".to_owned(),
            address_line2: Some("   ".to_owned()),
            city: "Ikeja".to_owned(),
            state: "Lagos".to_owned(),
            landmark: None,
        }
    }

    #[test]
    fn shipping_is_trimmed_and_phone_normalised() {
        let normalized = normalize_shipping("req", &address()).unwrap();
        assert_eq!(normalized.full_name, "Ada Obi");
        assert_eq!(normalized.phone, "+2348031234567");
        assert_eq!(normalized.address_line2, None);
    }

    #[test]
    fn blank_city_is_rejected() {
        let mut bad = address();
        bad.city = "  ".to_owned();
        let err = normalize_shipping("req", &bad).unwrap_err();
        assert_eq!(err.error.code, "validation_error");
        assert!(err.error.message.contains("shipping.city"));
    }
}
