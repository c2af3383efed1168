//! Postgres implementation of PriceRepository. Snapshots are insert-only.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{CryptoPrice, PriceQuote};
use crate::ports::{PriceRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresPriceRepository {
    pool: PgPool,
}

impl PostgresPriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceRepository for PostgresPriceRepository {
    async fn insert(&self, snapshot: &CryptoPrice) -> RepositoryResult<CryptoPrice> {
        let quote = &snapshot.quote;
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            INSERT INTO crypto_prices (
                id, symbol, usd, eur, gbp, ngn, usd_to_ngn_rate,
                usd_market_cap, usd_24h_vol, usd_24h_change, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(snapshot.id)
        .bind(&quote.symbol)
        .bind(&quote.usd)
        .bind(&quote.eur)
        .bind(&quote.gbp)
        .bind(&quote.ngn)
        .bind(&quote.usd_to_ngn_rate)
        .bind(&quote.usd_market_cap)
        .bind(&quote.usd_24h_vol)
        .bind(&quote.usd_24h_change)
        .bind(snapshot.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn latest(&self, limit: u32) -> RepositoryResult<Vec<CryptoPrice>> {
        let rows = sqlx::query_as::<_, PriceRow>(
            "SELECT * FROM crypto_prices ORDER BY timestamp DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(PriceRow::into_domain).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    id: Uuid,
    symbol: String,
    usd: BigDecimal,
    eur: BigDecimal,
    gbp: BigDecimal,
    ngn: BigDecimal,
    usd_to_ngn_rate: BigDecimal,
    usd_market_cap: Option<BigDecimal>,
    usd_24h_vol: Option<BigDecimal>,
    usd_24h_change: Option<BigDecimal>,
    timestamp: DateTime<Utc>,
}

impl PriceRow {
    fn into_domain(self) -> CryptoPrice {
        CryptoPrice {
            id: self.id,
            quote: PriceQuote {
                symbol: self.symbol,
                usd: self.usd,
                eur: self.eur,
                gbp: self.gbp,
                ngn: self.ngn,
                usd_to_ngn_rate: self.usd_to_ngn_rate,
                usd_market_cap: self.usd_market_cap,
                usd_24h_vol: self.usd_24h_vol,
                usd_24h_change: self.usd_24h_change,
            },
            timestamp: self.timestamp,
        }
    }
}
