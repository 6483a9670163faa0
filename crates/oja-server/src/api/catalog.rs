use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use oja_core::{from_price, resolve_margin, total_available, OfferCandidate};
use oja_db::{OfferRow, ProductRow};

use crate::middleware::RequestId;

use super::cart::{build_quote, load_pricing_settings, CartItemRequest, QuoteLineView};
use super::{
    map_db_error, normalize_limit, normalize_offset, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    id: i64,
    parent_id: Option<i64>,
    name: String,
    slug: String,
    sort_order: i32,
    product_count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CatalogQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CatalogItem {
    id: i64,
    public_id: uuid::Uuid,
    name: String,
    slug: String,
    category_slug: Option<String>,
    image_url: Option<String>,
    /// Cheapest customer price across usable offers, margin applied.
    from_price: Option<Decimal>,
    available_qty: i64,
    in_stock: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct VariantItem {
    id: i64,
    sku: String,
    title: String,
    attributes: serde_json::Value,
    from_price: Option<Decimal>,
    available_qty: i64,
    in_stock: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetail {
    #[serde(flatten)]
    product: CatalogItem,
    description: Option<String>,
    variants: Vec<VariantItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AvailabilityQuery {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(super) struct AvailabilityData {
    is_available: bool,
    #[serde(flatten)]
    line: QuoteLineView,
}

fn catalog_item(product: &ProductRow, offers: &[OfferCandidate], margin: Decimal) -> CatalogItem {
    let available_qty = total_available(offers);
    CatalogItem {
        id: product.id,
        public_id: product.public_id,
        name: product.name.clone(),
        slug: product.slug.clone(),
        category_slug: product.category_slug.clone(),
        image_url: product.image_url.clone(),
        from_price: from_price(offers, margin),
        available_qty,
        in_stock: available_qty > 0,
    }
}

/// Groups offers by product id, each as pricing candidates.
fn candidates_by_product(offers: &[OfferRow]) -> HashMap<i64, Vec<OfferCandidate>> {
    let mut grouped: HashMap<i64, Vec<OfferCandidate>> = HashMap::new();
    for offer in offers {
        grouped
            .entry(offer.product_id)
            .or_default()
            .push(offer.to_candidate());
    }
    grouped
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = oja_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| CategoryItem {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            slug: row.slug,
            sort_order: row.sort_order,
            product_count: row.product_count,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/catalog — product listing with "from" prices.
pub(super) async fn list_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<Vec<CatalogItem>>>, ApiError> {
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let products = oja_db::list_products(
        &state.pool,
        oja_db::ProductFilters {
            category_slug: category,
            search,
            limit: normalize_limit(query.limit),
            offset: normalize_offset(query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
    let offers = oja_db::list_offers_for_products(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let grouped = candidates_by_product(&offers);
    let global_margin = load_pricing_settings(&state.pool).await.margin_percent;

    let data = products
        .iter()
        .map(|product| {
            let margin = resolve_margin(product.margin_percent, Some(global_margin));
            let offers = grouped.get(&product.id).map_or(&[][..], Vec::as_slice);
            catalog_item(product, offers, margin)
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/catalog/{slug} — product detail with per-variant pricing.
pub(super) async fn get_catalog_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let product = oja_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("product '{slug}' not found"),
            )
        })?;

    let variants = oja_db::list_variants(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let offers = oja_db::list_offers_for_products(&state.pool, &[product.id])
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let global_margin = load_pricing_settings(&state.pool).await.margin_percent;
    let margin = resolve_margin(product.margin_percent, Some(global_margin));

    let all: Vec<OfferCandidate> = offers.iter().map(OfferRow::to_candidate).collect();
    let variant_items = variants
        .into_iter()
        .filter(|v| v.is_active)
        .map(|variant| {
            let own: Vec<OfferCandidate> = offers
                .iter()
                .filter(|o| o.variant_id == Some(variant.id))
                .map(OfferRow::to_candidate)
                .collect();
            let available_qty = total_available(&own);
            VariantItem {
                id: variant.id,
                sku: variant.sku,
                title: variant.title,
                attributes: variant.attributes,
                from_price: from_price(&own, margin),
                available_qty,
                in_stock: available_qty > 0,
            }
        })
        .collect();

    let data = ProductDetail {
        product: catalog_item(&product, &all, margin),
        description: product.description,
        variants: variant_items,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/availability — allocation preview for a single line.
pub(super) async fn check_availability(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<AvailabilityData>>, ApiError> {
    let item = CartItemRequest {
        product_id: query.product_id,
        variant_id: query.variant_id,
        quantity: query.quantity.unwrap_or(1),
    };
    let priced = build_quote(&state.pool, &req_id.0, std::slice::from_ref(&item)).await?;

    let line = priced.quote.lines.first().ok_or_else(|| {
        ApiError::new(req_id.0.clone(), "internal_error", "availability check failed")
    })?;
    let data = AvailabilityData {
        is_available: line.shortfall == 0 && line.allocated_qty > 0,
        line: priced.line_view(line),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: i64, product_id: i64, variant_id: Option<i64>, price: i64, qty: i32) -> OfferRow {
        OfferRow {
            id,
            supplier_id: 1,
            product_id,
            variant_id,
            price: Decimal::new(price, 0),
            available_qty: qty,
            is_active: true,
        }
    }

    #[test]
    fn offers_group_under_their_product() {
        let grouped = candidates_by_product(&[
            offer(1, 10, None, 500, 3),
            offer(2, 10, Some(4), 450, 2),
            offer(3, 11, None, 900, 1),
        ]);
        assert_eq!(grouped.get(&10).map(Vec::len), Some(2));
        assert_eq!(grouped.get(&11).map(Vec::len), Some(1));
        assert!(grouped.get(&12).is_none());
    }
}
