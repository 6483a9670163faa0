//! Command handlers. Called from `main` once the pool is connected.

use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use oja_core::pricing::round_money;
use oja_core::validation::{normalize_email, validate_password};
use oja_core::{price_cart, CartLine, Role};

use crate::CartItem;

pub(crate) async fn run_ping(pool: &PgPool) -> anyhow::Result<()> {
    oja_db::ping(pool).await?;
    println!("database reachable");
    Ok(())
}

pub(crate) async fn run_migrate(pool: &PgPool) -> anyhow::Result<()> {
    let applied = oja_db::run_migrations(pool).await?;
    println!("migrations up to date ({applied} applied)");
    Ok(())
}

/// Load the catalog seed file and upsert it in one transaction.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any insert
/// fails (the whole seed is rolled back).
pub(crate) async fn run_seed(pool: &PgPool, path: &Path) -> anyhow::Result<()> {
    let seed = oja_core::load_catalog_seed(path)?;
    let summary = oja_db::seed_catalog(pool, &seed).await?;
    tracing::info!(path = %path.display(), "catalog seed applied");
    println!(
        "seeded {} categories, {} suppliers, {} products, {} variants, {} offers",
        summary.categories, summary.suppliers, summary.products, summary.variants, summary.offers
    );
    Ok(())
}

/// Price `items` with the stored settings and print the quote as JSON,
/// supplier costs included.
///
/// # Errors
///
/// Returns an error if a product is missing or a query fails.
pub(crate) async fn run_quote(pool: &PgPool, items: &[CartItem]) -> anyhow::Result<()> {
    let settings = oja_db::get_pricing_settings(pool).await?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = oja_db::get_product_by_id(pool, item.product_id)
            .await?
            .filter(|p| p.is_active)
            .with_context(|| format!("product {} not found or inactive", item.product_id))?;
        let offers = oja_db::list_offers_for_line(pool, product.id, item.variant_id).await?;
        lines.push(CartLine {
            product_id: product.id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            margin_override: product.margin_percent,
            offers: offers.iter().map(oja_db::OfferRow::to_candidate).collect(),
        });
    }

    let quote = price_cart(&lines, &settings);
    let supplier_cost: rust_decimal::Decimal = quote
        .lines
        .iter()
        .flat_map(|l| l.allocations.iter())
        .map(|a| a.unit_cost * rust_decimal::Decimal::from(a.quantity))
        .sum();

    println!("{}", serde_json::to_string_pretty(&quote)?);
    println!(
        "supplier cost {} / gross margin {}",
        round_money(supplier_cost),
        round_money(quote.items_subtotal - supplier_cost)
    );
    if !quote.is_fulfillable {
        println!("warning: cart cannot be fully allocated from current stock");
    }
    Ok(())
}

pub(crate) async fn run_expire_orders(
    pool: &PgPool,
    older_than_minutes: u64,
) -> anyhow::Result<()> {
    let minutes = i64::try_from(older_than_minutes).context("older-than-minutes is too large")?;
    let cutoff = Utc::now() - Duration::minutes(minutes);
    let expired = oja_db::expire_pending_orders(pool, cutoff).await?;
    println!("expired {expired} pending order(s) created before {cutoff}");
    Ok(())
}

pub(crate) async fn run_purge_sessions(pool: &PgPool, older_than_days: u32) -> anyhow::Result<()> {
    let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
    let purged = oja_db::purge_stale_sessions(pool, cutoff).await?;
    println!("purged {purged} session(s) that ended before {cutoff}");
    Ok(())
}

/// Create an admin account. Fails if the email is already registered.
///
/// # Errors
///
/// Returns an error for an invalid email or weak password, or if the insert
/// fails.
pub(crate) async fn run_create_admin(
    pool: &PgPool,
    email: &str,
    password: &str,
    full_name: &str,
) -> anyhow::Result<()> {
    let email = normalize_email(email)?;
    validate_password(password)?;
    let full_name = full_name.trim();
    anyhow::ensure!(!full_name.is_empty(), "name must not be empty");

    let password_hash = oja_core::password::hash_password(password)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    let user = oja_db::create_user(
        pool,
        &email,
        &password_hash,
        full_name,
        None,
        Role::Admin.as_str(),
    )
    .await?;

    tracing::info!(user_id = user.id, "admin account created");
    println!("created admin {} ({})", user.email, user.public_id);
    Ok(())
}

/// Point supplier `slug` at the account for `email` and make that account a
/// supplier.
///
/// # Errors
///
/// Returns an error if the user or supplier does not exist, or if the user
/// is an admin.
pub(crate) async fn run_link_supplier(
    pool: &PgPool,
    slug: &str,
    email: &str,
) -> anyhow::Result<()> {
    let email = normalize_email(email)?;
    let user = oja_db::get_user_by_email(pool, &email)
        .await?
        .with_context(|| format!("no active user with email {email}"))?;
    anyhow::ensure!(
        user.role != Role::Admin.as_str(),
        "refusing to turn admin {email} into a supplier"
    );

    oja_db::link_supplier_user(pool, slug, user.id)
        .await
        .with_context(|| format!("supplier {slug} not found"))?;
    oja_db::set_user_role(pool, user.id, Role::Supplier.as_str()).await?;

    println!("linked {email} to supplier {slug}");
    Ok(())
}
