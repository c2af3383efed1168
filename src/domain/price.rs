//! Price data observed from the oracle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// Live prices of the base asset, one fetch's worth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub usd: BigDecimal,
    pub eur: BigDecimal,
    pub gbp: BigDecimal,
    /// Derived: `usd * usd_to_ngn_rate`.
    pub ngn: BigDecimal,
    pub usd_to_ngn_rate: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_market_cap: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_24h_vol: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_24h_change: Option<BigDecimal>,
}

impl PriceQuote {
    /// Combines the asset's direct fiat prices with the stablecoin FX proxy.
    pub fn from_components(
        symbol: impl Into<String>,
        usd: BigDecimal,
        eur: BigDecimal,
        gbp: BigDecimal,
        usd_to_ngn_rate: BigDecimal,
    ) -> Self {
        let ngn = &usd * &usd_to_ngn_rate;
        Self {
            symbol: symbol.into(),
            usd,
            eur,
            gbp,
            ngn,
            usd_to_ngn_rate,
            usd_market_cap: None,
            usd_24h_vol: None,
            usd_24h_change: None,
        }
    }

    /// Fiat prices a quote may be computed against. All must be strictly positive.
    pub fn quotable_prices(&self) -> [(&'static str, &BigDecimal); 4] {
        [
            ("ngn", &self.ngn),
            ("usd", &self.usd),
            ("eur", &self.eur),
            ("gbp", &self.gbp),
        ]
    }
}

/// Immutable audit record of one successful oracle poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CryptoPrice {
    pub id: Uuid,
    #[serde(flatten)]
    pub quote: PriceQuote,
    pub timestamp: DateTime<Utc>,
}

impl CryptoPrice {
    pub fn record(quote: PriceQuote) -> Self {
        Self {
            id: Uuid::new_v4(),
            quote,
            timestamp: Utc::now(),
        }
    }
}

/// One row of the oracle's market-cap ranking. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct MarketEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

/// Converts an upstream float through its shortest decimal rendering, so
/// `0.1` becomes exactly `0.1` rather than the nearest binary fraction.
pub fn decimal_from_f64(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    BigDecimal::from_str(&value.to_string()).ok()
}
