//! The single-row `pricing_settings` table.

use rust_decimal::Decimal;
use sqlx::PgPool;

use oja_core::PricingSettings;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    margin_percent: Decimal,
    vat_percent: Decimal,
    base_service_fee: Decimal,
    comms_fee: Decimal,
    gateway_fee_percent: Decimal,
    gateway_flat_fee: Decimal,
    gateway_flat_fee_threshold: Decimal,
    gateway_fee_cap: Decimal,
}

impl From<SettingsRow> for PricingSettings {
    fn from(row: SettingsRow) -> Self {
        Self {
            margin_percent: row.margin_percent,
            vat_percent: row.vat_percent,
            base_service_fee: row.base_service_fee,
            comms_fee: row.comms_fee,
            gateway_fee_percent: row.gateway_fee_percent,
            gateway_flat_fee: row.gateway_flat_fee,
            gateway_flat_fee_threshold: row.gateway_flat_fee_threshold,
            gateway_fee_cap: row.gateway_fee_cap,
        }
    }
}

const SETTINGS_COLUMNS: &str = "margin_percent, vat_percent, base_service_fee, comms_fee, \
     gateway_fee_percent, gateway_flat_fee, gateway_flat_fee_threshold, gateway_fee_cap";

/// Reads the current pricing settings. A missing row yields the defaults.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_pricing_settings(pool: &PgPool) -> Result<PricingSettings, DbError> {
    let row = sqlx::query_as::<_, SettingsRow>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM pricing_settings WHERE id = 1"
    ))
    .fetch_optional(pool)
    .await?;
    Ok(row.map(PricingSettings::from).unwrap_or_default())
}

/// Replaces the pricing settings.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including check-constraint
/// violations).
pub async fn update_pricing_settings(
    pool: &PgPool,
    settings: &PricingSettings,
) -> Result<PricingSettings, DbError> {
    let row = sqlx::query_as::<_, SettingsRow>(&format!(
        "INSERT INTO pricing_settings (id, {SETTINGS_COLUMNS}) \
         VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET \
             margin_percent             = EXCLUDED.margin_percent, \
             vat_percent                = EXCLUDED.vat_percent, \
             base_service_fee           = EXCLUDED.base_service_fee, \
             comms_fee                  = EXCLUDED.comms_fee, \
             gateway_fee_percent        = EXCLUDED.gateway_fee_percent, \
             gateway_flat_fee           = EXCLUDED.gateway_flat_fee, \
             gateway_flat_fee_threshold = EXCLUDED.gateway_flat_fee_threshold, \
             gateway_fee_cap            = EXCLUDED.gateway_fee_cap, \
             updated_at                 = NOW() \
         RETURNING {SETTINGS_COLUMNS}"
    ))
    .bind(settings.margin_percent)
    .bind(settings.vat_percent)
    .bind(settings.base_service_fee)
    .bind(settings.comms_fee)
    .bind(settings.gateway_fee_percent)
    .bind(settings.gateway_flat_fee)
    .bind(settings.gateway_flat_fee_threshold)
    .bind(settings.gateway_fee_cap)
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}
