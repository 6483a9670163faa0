//! Back-office handlers: catalog maintenance, pricing settings, payouts.
//! Every route here sits behind `require_admin`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oja_core::{slugify, PricingSettings};
use oja_db::{CategoryRow, ProductRow, PurchaseOrderRow, VariantRow};

use crate::middleware::RequestId;

use super::{map_db_error, parse_public_id, ApiError, ApiResponse, AppState, ResponseMeta};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct CreateCategoryRequest {
    pub name: String,
    pub slug: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductRequest {
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub margin_percent: Option<Decimal>,
}

// Option<Option<T>>: outer None = "not in request" (keep current),
// Some(None) = "explicitly cleared", Some(Some(v)) = "set to value".
#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateProductRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub margin_percent: Option<Option<Decimal>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateVariantRequest {
    pub sku: String,
    pub title: String,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
#[allow(clippy::option_option)]
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    id: i64,
    parent_id: Option<i64>,
    name: String,
    slug: String,
    sort_order: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct AdminProductItem {
    id: i64,
    public_id: Uuid,
    category_id: Option<i64>,
    category_slug: Option<String>,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    margin_percent: Option<Decimal>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct VariantItem {
    id: i64,
    product_id: i64,
    sku: String,
    title: String,
    attributes: serde_json::Value,
    is_active: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct PayoutItem {
    id: Uuid,
    order_id: Uuid,
    status: String,
    supplier_subtotal: Decimal,
    payout_status: String,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for CategoryItem {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            slug: row.slug,
            sort_order: row.sort_order,
        }
    }
}

impl From<ProductRow> for AdminProductItem {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            public_id: row.public_id,
            category_id: row.category_id,
            category_slug: row.category_slug,
            name: row.name,
            slug: row.slug,
            description: row.description,
            image_url: row.image_url,
            margin_percent: row.margin_percent,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<VariantRow> for VariantItem {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            sku: row.sku,
            title: row.title,
            attributes: row.attributes,
            is_active: row.is_active,
        }
    }
}

impl From<PurchaseOrderRow> for PayoutItem {
    fn from(row: PurchaseOrderRow) -> Self {
        Self {
            id: row.public_id,
            order_id: row.order_public_id,
            status: row.status,
            supplier_subtotal: row.supplier_subtotal,
            payout_status: row.payout_status,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_name(req_id: &str, field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 200 {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{field} must be 1-200 characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Explicit slug (normalised) or one derived from the name.
fn resolve_slug(req_id: &str, explicit: Option<&str>, name: &str) -> Result<String, ApiError> {
    let slug = slugify(explicit.map_or(name, str::trim));
    if slug.is_empty() {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "slug must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

fn validate_margin(req_id: &str, margin: Option<Decimal>) -> Result<(), ApiError> {
    match margin {
        Some(m) if m < Decimal::ZERO || m > Decimal::ONE_THOUSAND => Err(ApiError::new(
            req_id,
            "validation_error",
            "margin_percent must be between 0 and 1000",
        )),
        _ => Ok(()),
    }
}

fn validate_settings(req_id: &str, settings: &PricingSettings) -> Result<(), ApiError> {
    let fields = [
        ("margin_percent", settings.margin_percent),
        ("vat_percent", settings.vat_percent),
        ("base_service_fee", settings.base_service_fee),
        ("comms_fee", settings.comms_fee),
        ("gateway_fee_percent", settings.gateway_fee_percent),
        ("gateway_flat_fee", settings.gateway_flat_fee),
        ("gateway_flat_fee_threshold", settings.gateway_flat_fee_threshold),
        ("gateway_fee_cap", settings.gateway_fee_cap),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, v)| *v < Decimal::ZERO) {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{name} cannot be negative"),
        ));
    }
    if settings.vat_percent > Decimal::ONE_HUNDRED
        || settings.gateway_fee_percent > Decimal::ONE_HUNDRED
    {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "percentages cannot exceed 100",
        ));
    }
    validate_margin(req_id, Some(settings.margin_percent))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/categories
pub(super) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryItem>>), ApiError> {
    let rid = &req_id.0;
    let name = validate_name(rid, "name", &body.name)?;
    let slug = resolve_slug(rid, body.slug.as_deref(), &name)?;

    let row = oja_db::create_category(&state.pool, &name, &slug, body.parent_id, body.sort_order)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: row.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// POST /api/v1/admin/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AdminProductItem>>), ApiError> {
    let rid = &req_id.0;
    let name = validate_name(rid, "name", &body.name)?;
    let slug = resolve_slug(rid, body.slug.as_deref(), &name)?;
    validate_margin(rid, body.margin_percent)?;

    let row = oja_db::create_product(
        &state.pool,
        &oja_db::NewProduct {
            category_id: body.category_id,
            name: &name,
            slug: &slug,
            description: body.description.as_deref(),
            image_url: body.image_url.as_deref(),
            margin_percent: body.margin_percent,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(product_id = row.id, slug = %row.slug, "product created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: row.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// PATCH /api/v1/admin/products/{id}
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<AdminProductItem>>, ApiError> {
    let rid = &req_id.0;
    let name = match body.name.as_deref() {
        Some(raw) => Some(validate_name(rid, "name", raw)?),
        None => None,
    };
    validate_margin(rid, body.margin_percent.flatten())?;

    let patch = oja_db::ProductPatch {
        category_id: body.category_id,
        name: name.as_deref(),
        description: body.description.as_ref().map(Option::as_deref),
        image_url: body.image_url.as_ref().map(Option::as_deref),
        margin_percent: body.margin_percent,
        is_active: body.is_active,
    };
    let row = oja_db::update_product(&state.pool, product_id, &patch)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/admin/products/{id} — soft delete; offers are deactivated.
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = oja_db::soft_delete_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if !deleted {
        return Err(ApiError::new(req_id.0, "not_found", "product not found"));
    }
    tracing::info!(product_id, "product soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/products/{id}/variants
pub(super) async fn create_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
    Json(body): Json<CreateVariantRequest>,
) -> Result<(StatusCode, Json<ApiResponse<VariantItem>>), ApiError> {
    let rid = &req_id.0;
    let sku = body.sku.trim().to_ascii_uppercase();
    if sku.is_empty() || sku.len() > 64 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "sku must be 1-64 characters",
        ));
    }
    let title = validate_name(rid, "title", &body.title)?;
    let attributes = body
        .attributes
        .unwrap_or_else(|| serde_json::json!({}));
    if !attributes.is_object() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "attributes must be a JSON object",
        ));
    }

    oja_db::get_product_by_id(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "product not found"))?;

    let row = oja_db::create_variant(&state.pool, product_id, &sku, &title, &attributes)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: row.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/admin/pricing-settings
pub(super) async fn get_pricing_settings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<PricingSettings>>, ApiError> {
    let settings = oja_db::get_pricing_settings(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: settings,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PUT /api/v1/admin/pricing-settings
pub(super) async fn update_pricing_settings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<PricingSettings>,
) -> Result<Json<ApiResponse<PricingSettings>>, ApiError> {
    validate_settings(&req_id.0, &body)?;
    let settings = oja_db::update_pricing_settings(&state.pool, &body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        margin_percent = %settings.margin_percent,
        vat_percent = %settings.vat_percent,
        "pricing settings updated"
    );

    Ok(Json(ApiResponse {
        data: settings,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/admin/purchase-orders/{id}/payout — record a supplier payout.
pub(super) async fn mark_purchase_order_paid_out(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PayoutItem>>, ApiError> {
    let public_id = parse_public_id(&req_id.0, &id)?;
    let row = oja_db::mark_purchase_order_paid_out(&state.pool, public_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        purchase_order_id = row.id,
        supplier_id = row.supplier_id,
        amount = %row.supplier_subtotal,
        "purchase order paid out"
    );

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_defaults_to_name() {
        assert_eq!(
            resolve_slug("req", None, "Tecno Spark 10").unwrap(),
            "tecno-spark-10"
        );
        assert_eq!(
            resolve_slug("req", Some(" Custom Slug "), "ignored").unwrap(),
            "custom-slug"
        );
        assert!(resolve_slug("req", Some("!!!"), "x").is_err());
    }

    #[test]
    fn negative_settings_are_rejected() {
        let settings = PricingSettings {
            comms_fee: Decimal::new(-1, 0),
            ..PricingSettings::default()
        };
        let err = validate_settings("req", &settings).unwrap_err();
        assert!(err.error.message.contains("comms_fee"));
        assert!(validate_settings("req", &PricingSettings::default()).is_ok());
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let body: UpdateProductRequest =
            serde_json::from_str(r#"{"description": null, "margin_percent": "12.5"}"#).unwrap();
        assert_eq!(body.description, Some(None));
        assert_eq!(body.image_url, None);
        assert_eq!(body.margin_percent, Some(Some(Decimal::new(125, 1))));
    }
}
