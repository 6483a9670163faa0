use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// The parsing logic is decoupled from the process environment so it can be
/// tested with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let session_secret = require("OJA_SESSION_SECRET")?;

    let env = parse_environment(&or_default("OJA_ENV", "development"))?;

    let bind_addr = parse_addr("OJA_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("OJA_LOG_LEVEL", "info");
    let catalog_seed_path =
        PathBuf::from(or_default("OJA_CATALOG_SEED_PATH", "./config/catalog.yaml"));

    let session_ttl_hours = parse_u64("OJA_SESSION_TTL_HOURS", "720")?;
    let pending_order_ttl_minutes = parse_u64("OJA_PENDING_ORDER_TTL_MINUTES", "60")?;
    let bank_cache_ttl_secs = parse_u64("OJA_BANK_CACHE_TTL_SECS", "86400")?;

    let paystack_secret_key = optional("PAYSTACK_SECRET_KEY");
    let paystack_base_url = or_default("PAYSTACK_BASE_URL", "https://api.paystack.co");
    let paystack_callback_url = optional("PAYSTACK_CALLBACK_URL");
    let paystack_timeout_secs = parse_u64("OJA_PAYSTACK_TIMEOUT_SECS", "30")?;
    let paystack_max_retries = parse_u32("OJA_PAYSTACK_MAX_RETRIES", "2")?;

    let db_max_connections = parse_u32("OJA_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("OJA_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("OJA_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "OJA_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "must not exceed OJA_DB_MAX_CONNECTIONS ({db_min_connections} > {db_max_connections})"
            ),
        });
    }

    if env == Environment::Production && paystack_secret_key.is_none() {
        return Err(ConfigError::MissingEnvVar("PAYSTACK_SECRET_KEY".to_string()));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        catalog_seed_path,
        session_secret,
        session_ttl_hours,
        pending_order_ttl_minutes,
        bank_cache_ttl_secs,
        paystack_secret_key,
        paystack_base_url,
        paystack_callback_url,
        paystack_timeout_secs,
        paystack_max_retries,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "OJA_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
