//! Loads a validated [`CatalogSeed`] into the database.
//!
//! Every row is upserted by its natural key (slug, SKU, supplier × item), so
//! running the seed twice converges on the same catalog.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};

use oja_core::catalog::OfferSeed;
use oja_core::CatalogSeed;

use crate::DbError;

/// Row counts written by [`seed_catalog`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub suppliers: usize,
    pub products: usize,
    pub variants: usize,
    pub offers: usize,
}

/// Upserts categories, suppliers, products, variants and offers in one
/// transaction.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the seed references a category or
/// supplier that is not declared, or [`DbError::Sqlx`] if any statement
/// fails (nothing is written).
pub async fn seed_catalog(pool: &PgPool, seed: &CatalogSeed) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    let mut category_ids: HashMap<String, i64> = HashMap::new();
    for category in &seed.categories {
        let parent_id = match &category.parent {
            Some(parent) => Some(lookup(&category_ids, parent, "category")?),
            None => None,
        };
        let slug = category.slug();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, slug, parent_id, sort_order) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, parent_id = EXCLUDED.parent_id, \
                 sort_order = EXCLUDED.sort_order, is_active = true \
             RETURNING id",
        )
        .bind(&category.name)
        .bind(&slug)
        .bind(parent_id)
        .bind(category.sort_order)
        .fetch_one(&mut *tx)
        .await?;
        category_ids.insert(slug, id);
        summary.categories += 1;
    }

    let mut supplier_ids: HashMap<String, i64> = HashMap::new();
    for supplier in &seed.suppliers {
        let slug = supplier.slug();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO suppliers (name, slug, bank_code, account_number, account_name) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name           = EXCLUDED.name, \
                 bank_code      = COALESCE(EXCLUDED.bank_code, suppliers.bank_code), \
                 account_number = COALESCE(EXCLUDED.account_number, suppliers.account_number), \
                 account_name   = COALESCE(EXCLUDED.account_name, suppliers.account_name), \
                 updated_at     = NOW() \
             RETURNING id",
        )
        .bind(&supplier.name)
        .bind(&slug)
        .bind(&supplier.bank_code)
        .bind(&supplier.account_number)
        .bind(&supplier.account_name)
        .fetch_one(&mut *tx)
        .await?;
        supplier_ids.insert(slug, id);
        summary.suppliers += 1;
    }

    for product in &seed.products {
        let category_id = lookup(&category_ids, &product.category, "category")?;
        let product_id: i64 = sqlx::query_scalar(
            "INSERT INTO products (category_id, name, slug, description, image_url, margin_percent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (slug) DO UPDATE SET \
                 category_id    = EXCLUDED.category_id, \
                 name           = EXCLUDED.name, \
                 description    = EXCLUDED.description, \
                 image_url      = EXCLUDED.image_url, \
                 margin_percent = EXCLUDED.margin_percent, \
                 is_active      = true, \
                 deleted_at     = NULL, \
                 updated_at     = NOW() \
             RETURNING id",
        )
        .bind(category_id)
        .bind(&product.name)
        .bind(product.slug())
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.margin_percent)
        .fetch_one(&mut *tx)
        .await?;
        summary.products += 1;

        for offer in &product.offers {
            let supplier_id = lookup(&supplier_ids, &offer.supplier, "supplier")?;
            upsert_offer(
                &mut *tx,
                "supplier_product_offers",
                "product_id",
                supplier_id,
                product_id,
                offer,
            )
            .await?;
            summary.offers += 1;
        }

        for variant in &product.variants {
            let attributes = serde_json::to_value(&variant.attributes)
                .unwrap_or_else(|_| serde_json::json!({}));
            let variant_id: i64 = sqlx::query_scalar(
                "INSERT INTO product_variants (product_id, sku, title, attributes) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (sku) DO UPDATE SET \
                     product_id = EXCLUDED.product_id, \
                     title      = EXCLUDED.title, \
                     attributes = EXCLUDED.attributes, \
                     is_active  = true \
                 RETURNING id",
            )
            .bind(product_id)
            .bind(&variant.sku)
            .bind(&variant.title)
            .bind(&attributes)
            .fetch_one(&mut *tx)
            .await?;
            summary.variants += 1;

            for offer in &variant.offers {
                let supplier_id = lookup(&supplier_ids, &offer.supplier, "supplier")?;
                upsert_offer(
                    &mut *tx,
                    "supplier_variant_offers",
                    "variant_id",
                    supplier_id,
                    variant_id,
                    offer,
                )
                .await?;
                summary.offers += 1;
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        categories = summary.categories,
        suppliers = summary.suppliers,
        products = summary.products,
        variants = summary.variants,
        offers = summary.offers,
        "catalog seed applied"
    );
    Ok(summary)
}

async fn upsert_offer(
    conn: &mut PgConnection,
    table: &str,
    item_column: &str,
    supplier_id: i64,
    item_id: i64,
    offer: &OfferSeed,
) -> Result<(), DbError> {
    sqlx::query(&format!(
        "INSERT INTO {table} (supplier_id, {item_column}, price, available_qty) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (supplier_id, {item_column}) DO UPDATE SET \
             price = EXCLUDED.price, available_qty = EXCLUDED.available_qty, \
             is_active = true, updated_at = NOW()"
    ))
    .bind(supplier_id)
    .bind(item_id)
    .bind(offer.price)
    .bind(offer.quantity)
    .execute(conn)
    .await?;
    Ok(())
}

fn lookup(ids: &HashMap<String, i64>, slug: &str, what: &str) -> Result<i64, DbError> {
    ids.get(slug)
        .copied()
        .ok_or_else(|| DbError::Conflict(format!("seed references unknown {what} '{slug}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_reports_unknown_slug() {
        let mut ids = HashMap::new();
        ids.insert("phones".to_string(), 3);

        assert_eq!(lookup(&ids, "phones", "category").ok(), Some(3));
        let err = lookup(&ids, "laptops", "category").unwrap_err();
        assert!(err.to_string().contains("unknown category 'laptops'"));
    }
}
