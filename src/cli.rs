use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::{Config, CorsOrigins};
use crate::domain::TransactionStatus;
use crate::services::TransactionLifecycle;

#[derive(Parser)]
#[command(name = "exchange-core")]
#[command(about = "Exchange Core - P2P fiat/crypto order desk", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Move a transaction to a new status, recording it in the history
    SetStatus {
        /// Transaction UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        /// Target status, e.g. COMPLETED
        #[arg(value_name = "STATUS")]
        status: TransactionStatus,

        /// Note stored with the history entry
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Permanently delete a transaction
    Delete {
        /// Transaction UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration and check the database and oracle
    Check,
}

pub async fn handle_tx_set_status(
    lifecycle: &TransactionLifecycle,
    tx_id: Uuid,
    status: TransactionStatus,
    note: Option<String>,
) -> anyhow::Result<()> {
    let tx = lifecycle
        .update_status(tx_id, status, note)
        .await
        .map_err(|e| anyhow::anyhow!("Transaction {}: {}", tx_id, e))?;

    println!("Transaction {} is now {}", tx.id, tx.status);
    Ok(())
}

pub async fn handle_tx_delete(lifecycle: &TransactionLifecycle, tx_id: Uuid) -> anyhow::Result<()> {
    lifecycle
        .delete(tx_id)
        .await
        .map_err(|e| anyhow::anyhow!("Transaction {}: {}", tx_id, e))?;

    println!("Transaction {} deleted", tx_id);
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("Database migrations completed");

    Ok(())
}

pub async fn handle_config_check(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Oracle URL: {}", config.oracle.base_url);
    println!(
        "  Asset: {} ({})",
        config.oracle.asset_symbol, config.oracle.asset_id
    );
    println!("  Fee: {}%", config.quote.fee_percentage);
    println!(
        "  Order Limits: {} - {}",
        config.quote.min_amount, config.quote.max_amount
    );
    println!("  Payment Window: {}h", config.payment_window_hours);
    println!("  Strict Transitions: {}", config.strict_status_transitions);
    println!("  Upload Dir: {}", config.upload_dir.display());
    println!(
        "  CORS Origins: {}",
        match &config.cors_allowed_origins {
            CorsOrigins::Any => "*".to_string(),
            CorsOrigins::List(origins) => origins.join(", "),
        }
    );

    let pool = crate::db::create_pool(config).await?;
    let report = crate::startup::validate_environment(config, &pool).await;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Configuration check failed");
    }

    tracing::info!("Configuration is valid");
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
