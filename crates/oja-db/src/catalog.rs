//! Database operations for `categories`, `products`, and `product_variants`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A category with the number of live products filed directly under it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub sort_order: i32,
    pub product_count: i64,
}

/// A row from the `products` table plus its category slug.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub public_id: Uuid,
    pub category_id: Option<i64>,
    pub category_slug: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Per-product margin override; `None` means the global margin applies.
    pub margin_percent: Option<Decimal>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `product_variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub title: String,
    pub attributes: serde_json::Value,
    pub is_active: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProductFilters<'a> {
    /// Matches the category itself or any direct child of it.
    pub category_slug: Option<&'a str>,
    /// Case-insensitive substring match on name and description.
    pub search: Option<&'a str>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub category_id: Option<i64>,
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub margin_percent: Option<Decimal>,
}

// Option<Option<T>>: outer None keeps the current value, Some(None) clears it.
#[allow(clippy::option_option)]
#[derive(Debug, Default, Clone)]
pub struct ProductPatch<'a> {
    pub category_id: Option<Option<i64>>,
    pub name: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub image_url: Option<Option<&'a str>>,
    pub margin_percent: Option<Option<Decimal>>,
    pub is_active: Option<bool>,
}

const PRODUCT_COLUMNS: &str = "p.id, p.public_id, p.category_id, \
     (SELECT c.slug FROM categories c WHERE c.id = p.category_id) AS category_slug, \
     p.name, p.slug, p.description, p.image_url, p.margin_percent, p.is_active, \
     p.deleted_at, p.created_at, p.updated_at";

// ---------------------------------------------------------------------------
// categories
// ---------------------------------------------------------------------------

/// Returns active categories ordered for display.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT c.id, c.parent_id, c.name, c.slug, c.sort_order, \
                COUNT(p.id) AS product_count \
         FROM categories c \
         LEFT JOIN products p \
                ON p.category_id = c.id AND p.is_active = true AND p.deleted_at IS NULL \
         WHERE c.is_active = true \
         GROUP BY c.id \
         ORDER BY c.parent_id NULLS FIRST, c.sort_order, c.name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a category.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the slug is taken.
pub async fn create_category(
    pool: &PgPool,
    name: &str,
    slug: &str,
    parent_id: Option<i64>,
    sort_order: i32,
) -> Result<CategoryRow, DbError> {
    let result = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (name, slug, parent_id, sort_order) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, parent_id, name, slug, sort_order, 0::bigint AS product_count",
    )
    .bind(name)
    .bind(slug)
    .bind(parent_id)
    .bind(sort_order)
    .fetch_one(pool)
    .await
    .map_err(DbError::from);

    match result {
        Err(e) if e.is_unique_violation() => Err(DbError::Conflict(format!(
            "a category with slug '{slug}' already exists"
        ))),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

/// Lists live products for the storefront.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: ProductFilters<'_>,
) -> Result<Vec<ProductRow>, DbError> {
    let pattern = filters
        .search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id \
         LEFT JOIN categories pc ON pc.id = c.parent_id \
         WHERE p.is_active = true AND p.deleted_at IS NULL \
           AND ($1::text IS NULL OR c.slug = $1 OR pc.slug = $1) \
           AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2) \
         ORDER BY p.name, p.id \
         LIMIT $3 OFFSET $4"
    ))
    .bind(filters.category_slug)
    .bind(pattern)
    .bind(filters.limit)
    .bind(filters.offset.max(0))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Wraps a search term for `ILIKE`, escaping the backslash escape character
/// itself before the wildcards.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Returns a live product by slug.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_slug(pool: &PgPool, slug: &str) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p \
         WHERE p.slug = $1 AND p.is_active = true AND p.deleted_at IS NULL"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns a non-deleted product by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_id(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1 AND p.deleted_at IS NULL"
    ))
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts a product.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the slug is taken.
pub async fn create_product(
    pool: &PgPool,
    product: &NewProduct<'_>,
) -> Result<ProductRow, DbError> {
    let result = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products AS p \
             (category_id, name, slug, description, image_url, margin_percent) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product.category_id)
    .bind(product.name)
    .bind(product.slug)
    .bind(product.description)
    .bind(product.image_url)
    .bind(product.margin_percent)
    .fetch_one(pool)
    .await
    .map_err(DbError::from);

    match result {
        Err(e) if e.is_unique_violation() => Err(DbError::Conflict(format!(
            "a product with slug '{}' already exists",
            product.slug
        ))),
        other => other,
    }
}

/// Applies a sparse update to a non-deleted product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist or is deleted.
pub async fn update_product(
    pool: &PgPool,
    product_id: i64,
    patch: &ProductPatch<'_>,
) -> Result<ProductRow, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE products p SET \
             category_id    = CASE WHEN $2 THEN $3 ELSE p.category_id END, \
             name           = COALESCE($4, p.name), \
             description    = CASE WHEN $5 THEN $6 ELSE p.description END, \
             image_url      = CASE WHEN $7 THEN $8 ELSE p.image_url END, \
             margin_percent = CASE WHEN $9 THEN $10 ELSE p.margin_percent END, \
             is_active      = COALESCE($11, p.is_active), \
             updated_at     = NOW() \
         WHERE p.id = $1 AND p.deleted_at IS NULL \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(patch.category_id.is_some())
    .bind(patch.category_id.flatten())
    .bind(patch.name)
    .bind(patch.description.is_some())
    .bind(patch.description.flatten())
    .bind(patch.image_url.is_some())
    .bind(patch.image_url.flatten())
    .bind(patch.margin_percent.is_some())
    .bind(patch.margin_percent.flatten())
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await?;
    row.ok_or(DbError::NotFound)
}

/// Soft-deletes a product and deactivates its offers. Returns `false` if the
/// product was already deleted or never existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn soft_delete_product(pool: &PgPool, product_id: i64) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE products SET deleted_at = NOW(), is_active = false, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(product_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("UPDATE supplier_product_offers SET is_active = false WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "UPDATE supplier_variant_offers SET is_active = false \
         WHERE variant_id IN (SELECT id FROM product_variants WHERE product_id = $1)",
    )
    .bind(product_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// product_variants
// ---------------------------------------------------------------------------

/// Lists active variants for a product, ordered by title.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_variants(pool: &PgPool, product_id: i64) -> Result<Vec<VariantRow>, DbError> {
    let rows = sqlx::query_as::<_, VariantRow>(
        "SELECT id, product_id, sku, title, attributes, is_active \
         FROM product_variants \
         WHERE product_id = $1 AND is_active = true \
         ORDER BY title, id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a variant.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the SKU is taken.
pub async fn create_variant(
    pool: &PgPool,
    product_id: i64,
    sku: &str,
    title: &str,
    attributes: &serde_json::Value,
) -> Result<VariantRow, DbError> {
    let result = sqlx::query_as::<_, VariantRow>(
        "INSERT INTO product_variants (product_id, sku, title, attributes) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, product_id, sku, title, attributes, is_active",
    )
    .bind(product_id)
    .bind(sku)
    .bind(title)
    .bind(attributes)
    .fetch_one(pool)
    .await
    .map_err(DbError::from);

    match result {
        Err(e) if e.is_unique_violation() => Err(DbError::Conflict(format!(
            "a variant with sku '{sku}' already exists"
        ))),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
    }

    #[test]
    fn like_pattern_escapes_a_trailing_backslash() {
        assert_eq!(like_pattern(r"rice\"), r"%rice\\%");
    }
}
