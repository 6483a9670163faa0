mod api;
mod credentials;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use oja_paystack::PaystackClient;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, default_rate_limit_state, AppState, BankCache};

const PAYSTACK_BACKOFF_BASE_MS: u64 = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(oja_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = oja_db::PoolConfig::from_app_config(&config);
    let pool = oja_db::connect_pool(&config.database_url, pool_config).await?;
    oja_db::run_migrations(&pool).await?;

    let paystack = match config.paystack_secret_key.as_deref() {
        Some(key) => Some(
            PaystackClient::with_base_url(
                key,
                config.paystack_timeout_secs,
                &config.paystack_base_url,
            )?
            .with_retry(config.paystack_max_retries, PAYSTACK_BACKOFF_BASE_MS),
        ),
        None => {
            tracing::warn!("PAYSTACK_SECRET_KEY not set; payment routes will answer 503");
            None
        }
    };

    let _scheduler = scheduler::build_scheduler(pool.clone(), Arc::clone(&config)).await?;

    let state = AppState {
        pool,
        banks: BankCache::new(Duration::from_secs(config.bank_cache_ttl_secs)),
        config: Arc::clone(&config),
        paystack,
    };
    let app = build_app(state, default_rate_limit_state());

    tracing::info!(addr = %config.bind_addr, env = %config.env, "oja-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
