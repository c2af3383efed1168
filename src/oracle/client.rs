use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::{OracleError, PriceOracle};
use crate::domain::price::decimal_from_f64;
use crate::domain::{MarketEntry, PriceQuote};

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    /// Oracle id of the base asset, e.g. `lisk`.
    pub asset_id: String,
    pub asset_symbol: String,
    /// Stablecoin whose settlement-currency price stands in for the USD FX rate.
    pub fx_proxy_id: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub breaker_failures: u32,
    pub breaker_reset: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            asset_id: "lisk".to_string(),
            asset_symbol: "LSK".to_string(),
            fx_proxy_id: "usd-coin".to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_millis(2000),
            timeout: Duration::from_secs(10),
            breaker_failures: 5,
            breaker_reset: Duration::from_secs(60),
        }
    }
}

/// `/simple/price` entry; only the fields that were asked for are present.
#[derive(Debug, Default, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    eur: Option<f64>,
    gbp: Option<f64>,
    ngn: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for a CoinGecko-compatible price API.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    config: OracleConfig,
    circuit_breaker: Breaker,
}

impl CoinGeckoClient {
    pub fn new(config: OracleConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(config.breaker_reset, config.breaker_reset * 2);
        let policy = failure_policy::consecutive_failures(config.breaker_failures, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        CoinGeckoClient {
            client,
            config,
            circuit_breaker,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// GET with the 429 retry policy, inside the circuit breaker.
    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<T, OracleError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let client = self.client.clone();
        let max_attempts = self.config.max_attempts.max(1);
        let retry_delay = self.config.retry_delay;

        let result = self
            .circuit_breaker
            .call(async move {
                let mut attempt = 1;
                loop {
                    let response = client.get(&url).query(&query).send().await?;
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= max_attempts {
                            return Err(OracleError::RateLimited { attempts: attempt });
                        }
                        tracing::warn!(
                            url = %url,
                            attempt,
                            max_attempts,
                            "Price oracle rate limited, retrying"
                        );
                        tokio::time::sleep(retry_delay).await;
                        attempt += 1;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(OracleError::UpstreamStatus(status.as_u16()));
                    }

                    return response
                        .json::<T>()
                        .await
                        .map_err(|e| OracleError::InvalidResponse(e.to_string()));
                }
            })
            .await;

        match result {
            Ok(body) => Ok(body),
            Err(FailsafeError::Rejected) => Err(OracleError::CircuitBreakerOpen(
                "Price oracle circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn simple_price(
        &self,
        id: &str,
        vs_currencies: &str,
        with_market_data: bool,
    ) -> Result<SimplePrice, OracleError> {
        let mut query = vec![
            ("ids", id.to_string()),
            ("vs_currencies", vs_currencies.to_string()),
        ];
        if with_market_data {
            query.push(("include_market_cap", "true".to_string()));
            query.push(("include_24hr_vol", "true".to_string()));
            query.push(("include_24hr_change", "true".to_string()));
        }

        let mut body: HashMap<String, SimplePrice> = self.get_json("/simple/price", query).await?;
        body.remove(id)
            .ok_or_else(|| OracleError::InvalidResponse(format!("no price entry for '{}'", id)))
    }
}

fn required(value: Option<f64>, field: &str) -> Result<bigdecimal::BigDecimal, OracleError> {
    value
        .and_then(decimal_from_f64)
        .ok_or_else(|| OracleError::InvalidResponse(format!("missing or invalid '{}'", field)))
}

#[async_trait]
impl PriceOracle for CoinGeckoClient {
    async fn fetch_prices(&self) -> Result<PriceQuote, OracleError> {
        let asset = self
            .simple_price(&self.config.asset_id, "usd,eur,gbp", true)
            .await?;
        let fx = self
            .simple_price(&self.config.fx_proxy_id, "ngn", false)
            .await?;

        let mut quote = PriceQuote::from_components(
            self.config.asset_symbol.clone(),
            required(asset.usd, "usd")?,
            required(asset.eur, "eur")?,
            required(asset.gbp, "gbp")?,
            required(fx.ngn, "ngn")?,
        );
        quote.usd_market_cap = asset.usd_market_cap.and_then(decimal_from_f64);
        quote.usd_24h_vol = asset.usd_24h_vol.and_then(decimal_from_f64);
        quote.usd_24h_change = asset.usd_24h_change.and_then(decimal_from_f64);

        Ok(quote)
    }

    async fn top_markets(&self, limit: u32, page: u32) -> Result<Vec<MarketEntry>, OracleError> {
        let query = vec![
            ("vs_currency", "usd".to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", limit.to_string()),
            ("page", page.to_string()),
            ("sparkline", "false".to_string()),
        ];
        self.get_json("/coins/markets", query).await
    }
}
