use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub catalog_seed_path: PathBuf,
    pub session_secret: String,
    pub session_ttl_hours: u64,
    pub pending_order_ttl_minutes: u64,
    pub bank_cache_ttl_secs: u64,
    pub paystack_secret_key: Option<String>,
    pub paystack_base_url: String,
    pub paystack_callback_url: Option<String>,
    pub paystack_timeout_secs: u64,
    pub paystack_max_retries: u32,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("catalog_seed_path", &self.catalog_seed_path)
            .field("database_url", &"[redacted]")
            .field("session_secret", &"[redacted]")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("pending_order_ttl_minutes", &self.pending_order_ttl_minutes)
            .field("bank_cache_ttl_secs", &self.bank_cache_ttl_secs)
            .field(
                "paystack_secret_key",
                &self.paystack_secret_key.as_ref().map(|_| "[redacted]"),
            )
            .field("paystack_base_url", &self.paystack_base_url)
            .field("paystack_callback_url", &self.paystack_callback_url)
            .field("paystack_timeout_secs", &self.paystack_timeout_secs)
            .field("paystack_max_retries", &self.paystack_max_retries)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
