//! Cart quoting, shared by `/cart/quote`, `/availability` and checkout.

use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use oja_core::{price_cart, CartLine, PricingSettings, Quote, QuoteLine, ServiceFee};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const MAX_CART_LINES: usize = 100;
const MAX_LINE_QUANTITY: i32 = 1_000;

#[derive(Debug, Clone, Deserialize)]
pub(super) struct CartItemRequest {
    pub product_id: i64,
    #[serde(default)]
    pub variant_id: Option<i64>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct QuoteRequest {
    pub items: Vec<CartItemRequest>,
}

/// A priced cart plus the display names of what was priced.
#[derive(Debug)]
pub(super) struct PricedCart {
    pub quote: Quote,
    pub names: HashMap<(i64, Option<i64>), LineNames>,
}

#[derive(Debug, Clone)]
pub(super) struct LineNames {
    pub product_name: String,
    pub product_slug: String,
    pub variant_title: Option<String>,
}

// ---------------------------------------------------------------------------
// Response bodies (supplier costs and ids stay server-side)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct QuoteView {
    currency: String,
    lines: Vec<QuoteLineView>,
    items_subtotal: Decimal,
    tax_total: Decimal,
    service_fee: ServiceFee,
    total: Decimal,
    total_kobo: i64,
    is_fulfillable: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct QuoteLineView {
    product_id: i64,
    variant_id: Option<i64>,
    product_name: Option<String>,
    product_slug: Option<String>,
    variant_title: Option<String>,
    requested_qty: i32,
    allocated_qty: i32,
    shortfall: i32,
    unit_price: Decimal,
    line_total: Decimal,
    allocations: Vec<AllocationView>,
}

#[derive(Debug, Serialize)]
pub(super) struct AllocationView {
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl PricedCart {
    pub(super) fn line_view(&self, line: &QuoteLine) -> QuoteLineView {
        let names = self.names.get(&(line.product_id, line.variant_id));
        QuoteLineView {
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: names.map(|n| n.product_name.clone()),
            product_slug: names.map(|n| n.product_slug.clone()),
            variant_title: names.and_then(|n| n.variant_title.clone()),
            requested_qty: line.requested_qty,
            allocated_qty: line.allocated_qty,
            shortfall: line.shortfall,
            unit_price: line.unit_price,
            line_total: line.line_total,
            allocations: line
                .allocations
                .iter()
                .map(|a| AllocationView {
                    quantity: a.quantity,
                    unit_price: a.unit_price,
                    line_total: a.line_total,
                })
                .collect(),
        }
    }

    pub(super) fn view(&self) -> QuoteView {
        QuoteView {
            currency: self.quote.currency.clone(),
            lines: self.quote.lines.iter().map(|l| self.line_view(l)).collect(),
            items_subtotal: self.quote.items_subtotal,
            tax_total: self.quote.tax_total,
            service_fee: self.quote.service_fee.clone(),
            total: self.quote.total,
            total_kobo: self.quote.total_kobo,
            is_fulfillable: self.quote.is_fulfillable,
        }
    }
}

/// Pricing settings, or defaults with a zero margin when the row cannot be read.
pub(super) async fn load_pricing_settings(pool: &PgPool) -> PricingSettings {
    match oja_db::get_pricing_settings(pool).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "pricing settings unavailable; using zero margin");
            PricingSettings {
                margin_percent: Decimal::ZERO,
                ..PricingSettings::default()
            }
        }
    }
}

/// Sums quantities of repeated product/variant pairs, keeping first-seen order.
pub(super) fn merge_cart_items(items: &[CartItemRequest]) -> Vec<CartItemRequest> {
    let mut merged: Vec<CartItemRequest> = Vec::with_capacity(items.len());
    for item in items {
        match merged
            .iter_mut()
            .find(|m| m.product_id == item.product_id && m.variant_id == item.variant_id)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item.clone()),
        }
    }
    merged
}

pub(super) fn validate_cart_items(
    request_id: &str,
    items: &[CartItemRequest],
) -> Result<(), ApiError> {
    if items.len() > MAX_CART_LINES {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("a cart may hold at most {MAX_CART_LINES} lines"),
        ));
    }
    for item in items {
        if !(1..=MAX_LINE_QUANTITY).contains(&item.quantity) {
            return Err(ApiError::new(
                request_id,
                "validation_error",
                format!(
                    "quantity for product {} must be between 1 and {MAX_LINE_QUANTITY}",
                    item.product_id
                ),
            ));
        }
    }
    Ok(())
}

/// Checks every submitted line, then merges repeats and checks the totals.
pub(super) fn prepare_cart_items(
    request_id: &str,
    items: &[CartItemRequest],
) -> Result<Vec<CartItemRequest>, ApiError> {
    validate_cart_items(request_id, items)?;
    let merged = merge_cart_items(items);
    validate_cart_items(request_id, &merged)?;
    Ok(merged)
}

/// Loads products, variants and offers for `items` and prices them.
///
/// Unknown or inactive products and variants are `not_found`.
pub(super) async fn build_quote(
    pool: &PgPool,
    request_id: &str,
    items: &[CartItemRequest],
) -> Result<PricedCart, ApiError> {
    let items = prepare_cart_items(request_id, items)?;

    let settings = load_pricing_settings(pool).await;
    let mut lines = Vec::with_capacity(items.len());
    let mut names = HashMap::new();

    for item in &items {
        let product = oja_db::get_product_by_id(pool, item.product_id)
            .await
            .map_err(|e| map_db_error(request_id.to_owned(), &e))?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ApiError::new(
                    request_id,
                    "not_found",
                    format!("product {} not found", item.product_id),
                )
            })?;

        let variant_title = match item.variant_id {
            Some(variant_id) => {
                let variants = oja_db::list_variants(pool, product.id)
                    .await
                    .map_err(|e| map_db_error(request_id.to_owned(), &e))?;
                let variant = variants
                    .into_iter()
                    .find(|v| v.id == variant_id && v.is_active)
                    .ok_or_else(|| {
                        ApiError::new(
                            request_id,
                            "not_found",
                            format!("variant {variant_id} not found on product {}", product.id),
                        )
                    })?;
                Some(variant.title)
            }
            None => None,
        };

        let offers = oja_db::list_offers_for_line(pool, product.id, item.variant_id)
            .await
            .map_err(|e| map_db_error(request_id.to_owned(), &e))?;

        names.insert(
            (product.id, item.variant_id),
            LineNames {
                product_name: product.name.clone(),
                product_slug: product.slug.clone(),
                variant_title,
            },
        );
        lines.push(CartLine {
            product_id: product.id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            margin_override: product.margin_percent,
            offers: offers.iter().map(oja_db::OfferRow::to_candidate).collect(),
        });
    }

    Ok(PricedCart {
        quote: price_cart(&lines, &settings),
        names,
    })
}

/// POST /api/v1/cart/quote — price a cart without reserving anything.
pub(super) async fn quote_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<ApiResponse<QuoteView>>, ApiError> {
    let priced = build_quote(&state.pool, &req_id.0, &body.items).await?;

    Ok(Json(ApiResponse {
        data: priced.view(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: i64, variant_id: Option<i64>, quantity: i32) -> CartItemRequest {
        CartItemRequest {
            product_id,
            variant_id,
            quantity,
        }
    }

    #[test]
    fn repeated_lines_are_merged_in_first_seen_order() {
        let merged = merge_cart_items(&[
            item(2, None, 1),
            item(1, Some(7), 2),
            item(2, None, 3),
            item(1, None, 1),
        ]);
        let shape: Vec<(i64, Option<i64>, i32)> = merged
            .iter()
            .map(|i| (i.product_id, i.variant_id, i.quantity))
            .collect();
        assert_eq!(shape, vec![(2, None, 4), (1, Some(7), 2), (1, None, 1)]);
    }

    #[test]
    fn quantities_outside_bounds_are_rejected() {
        assert!(validate_cart_items("req", &[item(1, None, 1)]).is_ok());
        assert!(validate_cart_items("req", &[item(1, None, 0)]).is_err());
        assert!(validate_cart_items("req", &[item(1, None, 1_001)]).is_err());
    }

    #[test]
    fn a_negative_line_cannot_hide_in_a_merge() {
        let err = prepare_cart_items("req", &[item(4, None, -1), item(4, None, 3)]).unwrap_err();
        assert_eq!(err.error.code, "validation_error");

        let merged = prepare_cart_items("req", &[item(4, None, 1), item(4, None, 3)]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].quantity, 4);
    }

    #[test]
    fn merged_quantity_over_the_line_cap_is_rejected() {
        assert!(prepare_cart_items("req", &[item(4, None, 600), item(4, None, 600)]).is_err());
    }

    #[test]
    fn oversized_carts_are_rejected() {
        let items: Vec<CartItemRequest> = (0..=100).map(|i| item(i, None, 1)).collect();
        let err = validate_cart_items("req", &items).unwrap_err();
        assert_eq!(err.error.code, "validation_error");
    }
}
