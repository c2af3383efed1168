//! Price service: oracle fetch plus the snapshot audit trail.

use std::sync::Arc;

use crate::domain::{CryptoPrice, MarketEntry};
use crate::error::AppError;
use crate::oracle::PriceOracle;
use crate::ports::PriceRepository;

pub const HISTORY_DEFAULT_LIMIT: u32 = 10;
pub const HISTORY_MAX_LIMIT: u32 = 100;
pub const TOP_DEFAULT_LIMIT: u32 = 10;
pub const TOP_MAX_LIMIT: u32 = 250;

#[derive(Clone)]
pub struct PriceService {
    oracle: Arc<dyn PriceOracle>,
    repo: Arc<dyn PriceRepository>,
}

impl PriceService {
    pub fn new(oracle: Arc<dyn PriceOracle>, repo: Arc<dyn PriceRepository>) -> Self {
        Self { oracle, repo }
    }

    /// Fetches live prices and records a snapshot. Every successful fetch is
    /// persisted, whoever the caller is.
    pub async fn current_price(&self) -> Result<CryptoPrice, AppError> {
        let quote = self.oracle.fetch_prices().await?;
        let snapshot = self.repo.insert(&CryptoPrice::record(quote)).await?;

        tracing::info!(
            symbol = %snapshot.quote.symbol,
            usd = %snapshot.quote.usd,
            ngn = %snapshot.quote.ngn,
            "Stored price snapshot"
        );
        Ok(snapshot)
    }

    pub async fn history(&self, limit: Option<u32>) -> Result<Vec<CryptoPrice>, AppError> {
        let limit = limit
            .unwrap_or(HISTORY_DEFAULT_LIMIT)
            .clamp(1, HISTORY_MAX_LIMIT);
        Ok(self.repo.latest(limit).await?)
    }

    pub async fn top(&self, limit: Option<u32>, page: Option<u32>) -> Result<Vec<MarketEntry>, AppError> {
        let limit = limit.unwrap_or(TOP_DEFAULT_LIMIT).clamp(1, TOP_MAX_LIMIT);
        let page = page.unwrap_or(1).max(1);
        Ok(self.oracle.top_markets(limit, page).await?)
    }
}
