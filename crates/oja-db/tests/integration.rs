//! Offline unit tests for oja-db pool configuration and row types.
//! These tests do not require a live database connection.

use oja_core::{AppConfig, Environment};
use oja_db::{DbError, OfferKind, PoolConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        catalog_seed_path: PathBuf::from("./config/catalog.yaml"),
        session_secret: "salt".to_string(),
        session_ttl_hours: 720,
        pending_order_ttl_minutes: 60,
        bank_cache_ttl_secs: 86_400,
        paystack_secret_key: None,
        paystack_base_url: "https://api.paystack.co".to_string(),
        paystack_callback_url: None,
        paystack_timeout_secs: 30,
        paystack_max_retries: 2,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn insufficient_stock_error_names_the_offer() {
    let err = DbError::InsufficientStock {
        offer_kind: OfferKind::Variant.as_str(),
        offer_id: 12,
        requested: 4,
    };
    assert_eq!(
        err.to_string(),
        "insufficient stock on variant offer 12: wanted 4"
    );
    assert!(!err.is_unique_violation());
}

#[test]
fn conflict_error_carries_message() {
    let err = DbError::Conflict("refund exceeds balance".to_string());
    assert_eq!(err.to_string(), "conflict: refund exceeds balance");
}
