//! Price oracle: the external price feed behind a trait so services and
//! tests can swap the HTTP client for a fixed feed.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{MarketEntry, PriceQuote};

pub use client::{CoinGeckoClient, OracleConfig};

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Price oracle rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("Price oracle returned HTTP {0}")]
    UpstreamStatus(u16),
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid response from price oracle: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current asset prices in usd/eur/gbp plus the derived settlement price.
    async fn fetch_prices(&self) -> Result<PriceQuote, OracleError>;

    /// Assets ranked by market cap; `page` is 1-based.
    async fn top_markets(&self, limit: u32, page: u32) -> Result<Vec<MarketEntry>, OracleError>;
}
