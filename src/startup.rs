use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::adapters::{PostgresAccountRepository, PostgresPriceRepository, PostgresTransactionRepository};
use crate::auth::JwtKeys;
use crate::config::Config;
use crate::domain::QuoteCalculator;
use crate::health::{DependencyChecker, OracleChecker, PostgresChecker};
use crate::oracle::{CoinGeckoClient, PriceOracle};
use crate::ports::{AccountRepository, PriceRepository, TransactionRepository};
use crate::services::{AccountService, LocalProofStorage, PriceService, ProofStorage, TransactionLifecycle};
use crate::AppState;

/// Everything the services depend on, already constructed.
pub struct Ports {
    pub transactions: Arc<dyn TransactionRepository>,
    pub prices: Arc<dyn PriceRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub oracle: Arc<dyn PriceOracle>,
    pub storage: Arc<dyn ProofStorage>,
}

pub fn assemble(
    config: &Config,
    ports: Ports,
    health_checks: Vec<Arc<dyn DependencyChecker>>,
) -> AppState {
    let prices = PriceService::new(ports.oracle, ports.prices);
    let lifecycle = TransactionLifecycle::new(
        ports.transactions,
        prices.clone(),
        QuoteCalculator::new(config.quote.clone()),
        ports.storage,
        config.lifecycle_config(),
    );
    let accounts = AccountService::new(
        ports.accounts,
        JwtKeys::new(&config.jwt_secret, config.jwt_ttl()),
    );

    AppState {
        lifecycle,
        prices,
        accounts,
        health_checks: Arc::new(health_checks),
        started_at: Instant::now(),
    }
}

/// Production wiring: Postgres repositories, the HTTP oracle and local file storage.
pub fn build_state(config: &Config, pool: PgPool) -> AppState {
    let oracle = CoinGeckoClient::new(config.oracle.clone());
    tracing::info!(base_url = %config.oracle.base_url, "Price oracle client initialized");

    let ports = Ports {
        transactions: Arc::new(PostgresTransactionRepository::new(pool.clone())),
        prices: Arc::new(PostgresPriceRepository::new(pool.clone())),
        accounts: Arc::new(PostgresAccountRepository::new(pool.clone())),
        oracle: Arc::new(oracle.clone()),
        storage: Arc::new(LocalProofStorage::new(
            config.upload_dir.clone(),
            config.public_upload_url.clone(),
        )),
    };
    let health_checks: Vec<Arc<dyn DependencyChecker>> = vec![
        Arc::new(PostgresChecker::new(pool)),
        Arc::new(OracleChecker::new(oracle)),
    ];

    assemble(config, ports, health_checks)
}

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub oracle: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.oracle
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Price Oracle:          {}", status(self.oracle));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  - {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "PASS" } else { "FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        oracle: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_upload_dir(config).await {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {:#}", e));
    }

    if let Err(e) = validate_oracle(&config.oracle.base_url).await {
        report.oracle = false;
        report.errors.push(format!("Oracle: {:#}", e));
    }

    report
}

async fn validate_upload_dir(config: &Config) -> Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("cannot create upload dir {}", config.upload_dir.display()))
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_oracle(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .get(format!("{}/ping", base_url.trim_end_matches('/')))
        .send()
        .await
        .context("Failed to reach price oracle")?;

    if !response.status().is_success() {
        anyhow::bail!("Price oracle returned status: {}", response.status());
    }

    Ok(())
}
