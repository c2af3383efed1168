use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exchange_core::cli::{self, Cli, Commands, ConfigCommands, DbCommands, TxCommands};
use exchange_core::config::{Config, LogFormat};
use exchange_core::{create_app, db, startup, HttpSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Tx(command) => {
            let pool = db::create_pool(&config).await?;
            let state = startup::build_state(&config, pool);
            match command {
                TxCommands::SetStatus { tx_id, status, note } => {
                    cli::handle_tx_set_status(&state.lifecycle, tx_id, status, note).await
                }
                TxCommands::Delete { tx_id } => cli::handle_tx_delete(&state.lifecycle, tx_id).await,
            }
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config(ConfigCommands::Check) => cli::handle_config_check(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());

    tracing_subscriber::registry()
        .with(filter)
        .with((format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json()))
        .with((format == LogFormat::Pretty).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let report = startup::validate_environment(&config, &pool).await;
    if !report.is_valid() {
        report.print();
        if !report.environment || !report.database {
            anyhow::bail!("startup validation failed");
        }
        tracing::warn!("Price oracle unreachable at startup, serving in degraded mode");
    }

    let state = startup::build_state(&config, pool);
    let app = create_app(state, &HttpSettings::from_config(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
