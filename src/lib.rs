pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod oracle;
pub mod ports;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
};

use crate::config::{Config, CorsOrigins};
use crate::health::DependencyChecker;
use crate::services::{AccountService, PriceService, TransactionLifecycle};

/// Room for multipart boundaries and headers around the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: TransactionLifecycle,
    pub prices: PriceService,
    pub accounts: AccountService,
    pub health_checks: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub started_at: Instant,
}

/// Transport settings applied as router layers.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub cors: CorsOrigins,
}

impl HttpSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            cors: config.cors_allowed_origins.clone(),
        }
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origins {
        CorsOrigins::Any => cors.allow_origin(Any),
        CorsOrigins::List(list) => {
            let origins: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Skipping invalid CORS origin");
                        None
                    }
                })
                .collect();
            cors.allow_origin(origins)
        }
    }
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::users::register))
        .route("/login", post(handlers::users::login))
        .route(
            "/profile",
            get(handlers::users::get_profile).patch(handlers::users::update_profile),
        )
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(handlers::admin::initialize))
        .route("/login", post(handlers::admin::login))
}

fn crypto_routes() -> Router<AppState> {
    Router::new()
        .route("/price", get(handlers::crypto::current_price))
        .route("/history", get(handlers::crypto::price_history))
        .route("/top", get(handlers::crypto::top_coins))
}

fn transaction_routes() -> Router<AppState> {
    use handlers::transactions as tx;

    Router::new()
        .route("/", get(tx::list_all))
        .route("/buy", post(tx::create_buy_order))
        .route("/sell", post(tx::create_sell_order))
        .route("/my-transactions", get(tx::my_transactions))
        .route("/:id", get(tx::get_transaction))
        .route("/:id/payment-proof", post(tx::upload_payment_proof))
        .route("/:id/sell-proof", post(tx::upload_sell_proof))
        .route("/:id/status", patch(tx::update_status))
}

pub fn create_app(state: AppState, http: &HttpSettings) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/users", user_routes())
        .nest("/api/admin", admin_routes())
        .nest("/api/crypto", crypto_routes())
        .nest("/api/transactions", transaction_routes())
        .nest_service("/uploads", ServeDir::new(&http.upload_dir))
        .layer(DefaultBodyLimit::max(
            http.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(TimeoutLayer::new(http.request_timeout))
        .layer(cors_layer(&http.cors))
        .with_state(state)
}
