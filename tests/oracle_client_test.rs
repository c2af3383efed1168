use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bigdecimal::BigDecimal;
use mockito::Matcher;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use exchange_core::oracle::{CoinGeckoClient, OracleConfig, OracleError, PriceOracle};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn client_for(base_url: String) -> CoinGeckoClient {
    CoinGeckoClient::new(OracleConfig {
        base_url,
        retry_delay: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
        ..OracleConfig::default()
    })
}

fn asset_body() -> String {
    json!({
        "lisk": {
            "usd": 0.85,
            "eur": 0.78,
            "gbp": 0.67,
            "usd_market_cap": 123456789.0,
            "usd_24h_vol": 2345678.0,
            "usd_24h_change": -1.25
        }
    })
    .to_string()
}

fn fx_body() -> String {
    json!({ "usd-coin": { "ngn": 1600.0 } }).to_string()
}

#[tokio::test]
async fn fetch_prices_derives_settlement_price_from_fx_proxy() {
    let mut server = mockito::Server::new_async().await;
    let asset = server
        .mock("GET", "/simple/price")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ids".into(), "lisk".into()),
            Matcher::UrlEncoded("vs_currencies".into(), "usd,eur,gbp".into()),
            Matcher::UrlEncoded("include_market_cap".into(), "true".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(asset_body())
        .create_async()
        .await;
    let fx = server
        .mock("GET", "/simple/price")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ids".into(), "usd-coin".into()),
            Matcher::UrlEncoded("vs_currencies".into(), "ngn".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(fx_body())
        .create_async()
        .await;

    let quote = client_for(server.url()).fetch_prices().await.unwrap();

    assert_eq!(quote.symbol, "LSK");
    assert_eq!(quote.usd, dec("0.85"));
    assert_eq!(quote.eur, dec("0.78"));
    assert_eq!(quote.gbp, dec("0.67"));
    assert_eq!(quote.usd_to_ngn_rate, dec("1600"));
    assert_eq!(quote.ngn, dec("1360"));
    assert_eq!(quote.usd_24h_change, Some(dec("-1.25")));

    asset.assert_async().await;
    fx.assert_async().await;
}

#[tokio::test]
async fn persistent_rate_limit_gives_up_after_max_attempts() {
    let mut server = mockito::Server::new_async().await;
    let limited = server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let err = client_for(server.url()).fetch_prices().await.unwrap_err();

    assert!(matches!(err, OracleError::RateLimited { attempts: 3 }), "{:?}", err);
    limited.assert_async().await;
}

#[tokio::test]
async fn other_upstream_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let err = client_for(server.url()).fetch_prices().await.unwrap_err();

    assert!(matches!(err, OracleError::UpstreamStatus(500)), "{:?}", err);
    failing.assert_async().await;
}

#[tokio::test]
async fn missing_price_field_is_an_invalid_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/simple/price")
        .match_query(Matcher::UrlEncoded("ids".into(), "lisk".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "lisk": { "usd": 0.85, "eur": 0.78 } }).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/simple/price")
        .match_query(Matcher::UrlEncoded("ids".into(), "usd-coin".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(fx_body())
        .create_async()
        .await;

    let err = client_for(server.url()).fetch_prices().await.unwrap_err();
    assert!(matches!(err, OracleError::InvalidResponse(_)), "{:?}", err);
}

#[tokio::test]
async fn top_markets_passes_paging_through() {
    let mut server = mockito::Server::new_async().await;
    let markets = server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("vs_currency".into(), "usd".into()),
            Matcher::UrlEncoded("order".into(), "market_cap_desc".into()),
            Matcher::UrlEncoded("per_page".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), "3".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 64000.0, "market_cap_rank": 5},
                {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3100.5, "market_cap_rank": 6}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let entries = client_for(server.url()).top_markets(2, 3).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "bitcoin");
    assert_eq!(entries[1].market_cap_rank, Some(6));
    markets.assert_async().await;
}

#[tokio::test]
async fn breaker_opens_after_consecutive_failures() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let client = CoinGeckoClient::new(OracleConfig {
        base_url: server.url(),
        breaker_failures: 2,
        breaker_reset: Duration::from_secs(60),
        ..OracleConfig::default()
    });

    for _ in 0..2 {
        let err = client.fetch_prices().await.unwrap_err();
        assert!(matches!(err, OracleError::UpstreamStatus(503)));
    }
    assert_eq!(client.circuit_state(), "open");

    let err = client.fetch_prices().await.unwrap_err();
    assert!(matches!(err, OracleError::CircuitBreakerOpen(_)), "{:?}", err);
    failing.assert_async().await;
}

/// Upstream that answers 429 for the first `limited` asset requests.
async fn spawn_flaky_upstream(limited: usize) -> (String, Arc<AtomicUsize>) {
    async fn simple_price(
        State((hits, limited)): State<(Arc<AtomicUsize>, usize)>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        match params.get("ids").map(String::as_str) {
            Some("lisk") => {
                let seen = hits.fetch_add(1, Ordering::SeqCst);
                if seen < limited {
                    return (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))).into_response();
                }
                Json(json!({ "lisk": { "usd": 1.0, "eur": 0.9, "gbp": 0.8 } })).into_response()
            }
            Some("usd-coin") => Json(json!({ "usd-coin": { "ngn": 1500.0 } })).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/simple/price", get(simple_price))
        .with_state((hits.clone(), limited));

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();
    tokio::spawn(async move {
        server.await.unwrap();
    });

    (format!("http://{}", actual_addr), hits)
}

#[tokio::test]
async fn transient_rate_limit_is_retried_until_success() {
    let (base_url, hits) = spawn_flaky_upstream(2).await;

    let quote = client_for(base_url).fetch_prices().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(quote.ngn, dec("1500"));
}

#[tokio::test]
async fn rate_limit_on_last_attempt_still_fails() {
    let (base_url, hits) = spawn_flaky_upstream(3).await;

    let err = client_for(base_url).fetch_prices().await.unwrap_err();

    assert!(matches!(err, OracleError::RateLimited { attempts: 3 }));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
