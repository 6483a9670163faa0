pub mod app_config;
pub mod catalog;
pub mod config;
pub mod orders;
pub mod password;
pub mod pricing;
pub mod validation;

pub use app_config::{AppConfig, Environment};
pub use catalog::{load_catalog_seed, slugify, CatalogSeed};
pub use config::{load_app_config, load_app_config_from_env};
pub use orders::{OrderStatus, PaymentStatus, PurchaseOrderStatus, RefundStatus, Role};
pub use pricing::{
    allocate, apply_margin, compute_tax, from_kobo, from_price, price_cart, resolve_margin,
    service_fee, to_kobo, total_available, Allocation, AllocationLine, CartLine, OfferCandidate,
    PricedAllocation, PricingSettings, Quote, QuoteLine, ServiceFee, CURRENCY,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read catalog seed file {path}: {source}")]
    SeedFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog seed file: {0}")]
    SeedFileParse(#[from] serde_yaml::Error),

    #[error("catalog seed validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown order status: {0}")]
    UnknownOrderStatus(String),

    #[error("unknown purchase order status: {0}")]
    UnknownPurchaseOrderStatus(String),

    #[error("unknown refund status: {0}")]
    UnknownRefundStatus(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
