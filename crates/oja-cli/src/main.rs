mod ops;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "oja-cli")]
#[command(about = "Oja marketplace operations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Price a cart against live offers without reserving stock
    Quote {
        /// Cart line as `PRODUCT_ID[:VARIANT_ID]xQTY`, e.g. `12x3` or `12:40x1`
        #[arg(long = "item", required = true, value_parser = parse_cart_item)]
        items: Vec<CartItem>,
    },
    /// Order housekeeping
    Orders {
        #[command(subcommand)]
        command: OrderCommands,
    },
    /// Session housekeeping
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Account administration
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load categories, suppliers, products and offers from a YAML file
    Seed {
        /// Defaults to `CATALOG_SEED_PATH`
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum OrderCommands {
    /// Cancel unpaid orders older than the TTL and release their stock
    Expire {
        /// Overrides `PENDING_ORDER_TTL_MINUTES`
        #[arg(long)]
        older_than_minutes: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum SessionCommands {
    /// Delete sessions that were revoked or expired before the cutoff
    Purge {
        #[arg(long, default_value = "7")]
        older_than_days: u32,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "OJA_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: String,
    },
    /// Attach a user to a supplier and grant the supplier role
    LinkSupplier {
        /// Supplier slug from the catalog seed
        #[arg(long)]
        slug: String,
        #[arg(long)]
        email: String,
    },
}

/// One `--item` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CartItem {
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i32,
}

fn parse_cart_item(raw: &str) -> Result<CartItem, String> {
    let (target, qty) = raw
        .trim()
        .rsplit_once(['x', 'X'])
        .ok_or_else(|| format!("expected PRODUCT_ID[:VARIANT_ID]xQTY, got {raw:?}"))?;
    let quantity: i32 = qty
        .parse()
        .map_err(|_| format!("invalid quantity {qty:?}"))?;
    if quantity < 1 {
        return Err("quantity must be at least 1".to_string());
    }

    let (product, variant) = match target.split_once(':') {
        Some((p, v)) => (p, Some(v)),
        None => (target, None),
    };
    let product_id = product
        .parse()
        .map_err(|_| format!("invalid product id {product:?}"))?;
    let variant_id = variant
        .map(|v| v.parse().map_err(|_| format!("invalid variant id {v:?}")))
        .transpose()?;

    Ok(CartItem {
        product_id,
        variant_id,
        quantity,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("oja-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = oja_core::load_app_config()?;
    let pool_config = oja_db::PoolConfig::from_app_config(&config);
    let pool = oja_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => ops::run_ping(&pool).await?,
            DbCommands::Migrate => ops::run_migrate(&pool).await?,
            DbCommands::Seed { path } => {
                let path = path.unwrap_or_else(|| config.catalog_seed_path.clone());
                ops::run_seed(&pool, &path).await?;
            }
        },
        Commands::Quote { items } => ops::run_quote(&pool, &items).await?,
        Commands::Orders { command } => match command {
            OrderCommands::Expire { older_than_minutes } => {
                let minutes = older_than_minutes.unwrap_or(config.pending_order_ttl_minutes);
                ops::run_expire_orders(&pool, minutes).await?;
            }
        },
        Commands::Sessions { command } => match command {
            SessionCommands::Purge { older_than_days } => {
                ops::run_purge_sessions(&pool, older_than_days).await?;
            }
        },
        Commands::Users { command } => match command {
            UserCommands::CreateAdmin {
                email,
                password,
                name,
            } => ops::run_create_admin(&pool, &email, &password, &name).await?,
            UserCommands::LinkSupplier { slug, email } => {
                ops::run_link_supplier(&pool, &slug, &email).await?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests;
