//! Database operations for supplier offers on products and variants.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use oja_core::OfferCandidate;

use crate::DbError;

/// Which offer table a row (or an order item) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
    Product,
    Variant,
}

impl OfferKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Variant => "variant",
        }
    }

    #[must_use]
    pub fn for_variant(variant_id: Option<i64>) -> Self {
        if variant_id.is_some() {
            Self::Variant
        } else {
            Self::Product
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Product => "supplier_product_offers",
            Self::Variant => "supplier_variant_offers",
        }
    }
}

/// An offer from either table, normalised to the owning product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfferRow {
    pub id: i64,
    pub supplier_id: i64,
    pub product_id: i64,
    /// `None` for product-level offers.
    pub variant_id: Option<i64>,
    pub price: Decimal,
    pub available_qty: i32,
    pub is_active: bool,
}

impl OfferRow {
    #[must_use]
    pub fn kind(&self) -> OfferKind {
        OfferKind::for_variant(self.variant_id)
    }

    #[must_use]
    pub fn to_candidate(&self) -> OfferCandidate {
        OfferCandidate {
            offer_id: self.id,
            supplier_id: self.supplier_id,
            unit_price: self.price,
            available_qty: self.available_qty,
            is_active: self.is_active,
        }
    }
}

/// Returns the offers that can fill one cart line: product-level offers when
/// `variant_id` is `None`, otherwise the offers on that variant (which must
/// belong to `product_id`). Offers from inactive suppliers are excluded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_offers_for_line(
    pool: &PgPool,
    product_id: i64,
    variant_id: Option<i64>,
) -> Result<Vec<OfferRow>, DbError> {
    let rows = match variant_id {
        None => {
            sqlx::query_as::<_, OfferRow>(
                "SELECT o.id, o.supplier_id, o.product_id, NULL::bigint AS variant_id, \
                        o.price, o.available_qty, o.is_active \
                 FROM supplier_product_offers o \
                 JOIN suppliers s ON s.id = o.supplier_id AND s.is_active = true \
                 WHERE o.product_id = $1 \
                 ORDER BY o.price, o.available_qty DESC, o.id",
            )
            .bind(product_id)
            .fetch_all(pool)
            .await?
        }
        Some(variant_id) => {
            sqlx::query_as::<_, OfferRow>(
                "SELECT o.id, o.supplier_id, v.product_id, o.variant_id, \
                        o.price, o.available_qty, o.is_active \
                 FROM supplier_variant_offers o \
                 JOIN product_variants v ON v.id = o.variant_id AND v.is_active = true \
                 JOIN suppliers s ON s.id = o.supplier_id AND s.is_active = true \
                 WHERE o.variant_id = $1 AND v.product_id = $2 \
                 ORDER BY o.price, o.available_qty DESC, o.id",
            )
            .bind(variant_id)
            .bind(product_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Returns every product and variant offer for the given products, used to
/// compute "from" prices and availability on listings.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_offers_for_products(
    pool: &PgPool,
    product_ids: &[i64],
) -> Result<Vec<OfferRow>, DbError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, OfferRow>(
        "SELECT o.id, o.supplier_id, o.product_id, NULL::bigint AS variant_id, \
                o.price, o.available_qty, o.is_active \
         FROM supplier_product_offers o \
         JOIN suppliers s ON s.id = o.supplier_id AND s.is_active = true \
         WHERE o.product_id = ANY($1) \
         UNION ALL \
         SELECT o.id, o.supplier_id, v.product_id, o.variant_id, \
                o.price, o.available_qty, o.is_active \
         FROM supplier_variant_offers o \
         JOIN product_variants v ON v.id = o.variant_id AND v.is_active = true \
         JOIN suppliers s ON s.id = o.supplier_id AND s.is_active = true \
         WHERE v.product_id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts or updates a supplier's offer on a product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product is missing or deleted.
pub async fn upsert_product_offer(
    pool: &PgPool,
    supplier_id: i64,
    product_id: i64,
    price: Decimal,
    available_qty: i32,
    is_active: bool,
) -> Result<OfferRow, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(
        "INSERT INTO supplier_product_offers (supplier_id, product_id, price, available_qty, is_active) \
         SELECT $1, p.id, $3, $4, $5 FROM products p WHERE p.id = $2 AND p.deleted_at IS NULL \
         ON CONFLICT (supplier_id, product_id) DO UPDATE SET \
             price         = EXCLUDED.price, \
             available_qty = EXCLUDED.available_qty, \
             is_active     = EXCLUDED.is_active, \
             updated_at    = NOW() \
         RETURNING id, supplier_id, product_id, NULL::bigint AS variant_id, \
                   price, available_qty, is_active",
    )
    .bind(supplier_id)
    .bind(product_id)
    .bind(price)
    .bind(available_qty)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;
    row.ok_or(DbError::NotFound)
}

/// Inserts or updates a supplier's offer on a variant.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the variant is missing or its product is
/// deleted.
pub async fn upsert_variant_offer(
    pool: &PgPool,
    supplier_id: i64,
    variant_id: i64,
    price: Decimal,
    available_qty: i32,
    is_active: bool,
) -> Result<OfferRow, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(
        "WITH upserted AS ( \
             INSERT INTO supplier_variant_offers (supplier_id, variant_id, price, available_qty, is_active) \
             SELECT $1, v.id, $3, $4, $5 \
             FROM product_variants v \
             JOIN products p ON p.id = v.product_id AND p.deleted_at IS NULL \
             WHERE v.id = $2 \
             ON CONFLICT (supplier_id, variant_id) DO UPDATE SET \
                 price         = EXCLUDED.price, \
                 available_qty = EXCLUDED.available_qty, \
                 is_active     = EXCLUDED.is_active, \
                 updated_at    = NOW() \
             RETURNING id, supplier_id, variant_id, price, available_qty, is_active \
         ) \
         SELECT u.id, u.supplier_id, v.product_id, u.variant_id, \
                u.price, u.available_qty, u.is_active \
         FROM upserted u JOIN product_variants v ON v.id = u.variant_id",
    )
    .bind(supplier_id)
    .bind(variant_id)
    .bind(price)
    .bind(available_qty)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;
    row.ok_or(DbError::NotFound)
}

/// Decrements stock on one offer, only if enough is left.
///
/// Must run inside the order transaction; the conditional `WHERE` makes the
/// reservation race-free.
///
/// # Errors
///
/// Returns [`DbError::InsufficientStock`] when the offer cannot cover
/// `quantity`.
pub(crate) async fn reserve_stock(
    conn: &mut PgConnection,
    kind: OfferKind,
    offer_id: i64,
    quantity: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET available_qty = available_qty - $2, updated_at = NOW() \
         WHERE id = $1 AND is_active = true AND available_qty >= $2",
        kind.table()
    ))
    .bind(offer_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InsufficientStock {
            offer_kind: kind.as_str(),
            offer_id,
            requested: quantity,
        });
    }
    Ok(())
}

/// Puts previously reserved stock back on an offer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub(crate) async fn release_stock(
    conn: &mut PgConnection,
    kind: OfferKind,
    offer_id: i64,
    quantity: i32,
) -> Result<(), DbError> {
    sqlx::query(&format!(
        "UPDATE {} SET available_qty = available_qty + $2, updated_at = NOW() WHERE id = $1",
        kind.table()
    ))
    .bind(offer_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_kind_follows_variant_presence() {
        assert_eq!(OfferKind::for_variant(None), OfferKind::Product);
        assert_eq!(OfferKind::for_variant(Some(4)), OfferKind::Variant);
        assert_eq!(OfferKind::Variant.as_str(), "variant");
    }

    #[test]
    fn offer_row_maps_to_candidate() {
        let row = OfferRow {
            id: 9,
            supplier_id: 2,
            product_id: 1,
            variant_id: None,
            price: Decimal::new(45_000, 2),
            available_qty: 3,
            is_active: true,
        };
        let candidate = row.to_candidate();
        assert_eq!(candidate.offer_id, 9);
        assert_eq!(candidate.supplier_id, 2);
        assert_eq!(candidate.unit_price, Decimal::new(45_000, 2));
        assert_eq!(row.kind(), OfferKind::Product);
    }
}
