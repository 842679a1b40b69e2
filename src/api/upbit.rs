use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{Candle, OrderReceipt, OrderUpdate};
use crate::{BotError, Result};

const UPBIT_API_BASE: &str = "https://api.upbit.com";
const RATE_LIMIT_RPS: u32 = 8; // Upbit allows 10/s on the tighter group, keep headroom
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Type alias for the rate limiter to simplify signatures
type UpbitRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

type HmacSha256 = Hmac<Sha256>;

/// Upbit REST client.
///
/// Private endpoints carry an HS256 JWT whose payload holds the access key,
/// a fresh nonce and, when parameters are present, a SHA-512 hash of the
/// query string. Clones share the rate limiter.
#[derive(Clone)]
pub struct UpbitClient {
    client: Client,
    access_key: String,
    secret_key: String,
    base_url: String,
    rate_limiter: Arc<UpbitRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct CandleDto {
    candle_date_time_utc: String,
    opening_price: f64,
    high_price: f64,
    low_price: f64,
    trade_price: f64,
}

impl CandleDto {
    fn into_candle(self) -> Result<Candle> {
        let naive = NaiveDateTime::parse_from_str(&self.candle_date_time_utc, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| {
                BotError::Unexpected(format!(
                    "bad candle timestamp {}: {e}",
                    self.candle_date_time_utc
                ))
            })?;

        Ok(Candle {
            timestamp: naive.and_utc(),
            open: self.opening_price,
            high: self.high_price,
            low: self.low_price,
            close: self.trade_price,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OrderbookDto {
    orderbook_units: Vec<OrderbookUnitDto>,
}

#[derive(Debug, Deserialize)]
struct OrderbookUnitDto {
    ask_price: f64,
}

#[derive(Debug, Deserialize)]
struct AccountDto {
    currency: String,
    balance: String,
}

/// POST /v1/orders acknowledgement; amount fields are decimal strings
#[derive(Debug, Deserialize)]
struct OrderResponseDto {
    uuid: Option<String>,
    volume: Option<String>,
    price: Option<String>,
}

impl OrderResponseDto {
    fn into_receipt(self) -> Result<OrderReceipt> {
        let raw = self
            .uuid
            .ok_or_else(|| BotError::OrderRejected("order accepted without identifier".to_string()))?;
        let uuid = Uuid::parse_str(&raw)
            .map_err(|_| BotError::Unexpected(format!("unparseable order id: {raw}")))?;

        Ok(OrderReceipt {
            uuid,
            requested_volume: self.volume.and_then(|v| v.parse().ok()),
            requested_price: self.price.and_then(|p| p.parse().ok()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OrderDetailDto {
    executed_volume: Option<String>,
    #[serde(default)]
    trades: Vec<OrderTradeDto>,
}

#[derive(Debug, Deserialize)]
struct OrderTradeDto {
    volume: String,
    funds: String,
}

impl OrderDetailDto {
    fn into_update(self) -> Result<OrderUpdate> {
        let executed = match &self.executed_volume {
            Some(s) => parse_f64(s, "executed_volume")?,
            None => 0.0,
        };

        let mut trade_volume = 0.0;
        let mut trade_funds = 0.0;
        for trade in &self.trades {
            trade_volume += parse_f64(&trade.volume, "trade volume")?;
            trade_funds += parse_f64(&trade.funds, "trade funds")?;
        }

        Ok(OrderUpdate {
            executed_volume: (executed > 0.0).then_some(executed),
            average_price: (trade_volume > 0.0).then(|| trade_funds / trade_volume),
        })
    }
}

fn parse_f64(raw: &str, field: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| BotError::Unexpected(format!("unparseable {field}: {raw}")))
}

impl UpbitClient {
    pub fn new(access_key: String, secret_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BotError::Unexpected(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_RPS).unwrap());

        Ok(Self {
            client,
            access_key,
            secret_key,
            base_url: UPBIT_API_BASE.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Point at a different server (tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// HS256 JWT for the Authorization header, hashing `query` when present
    fn auth_header(&self, query: Option<&str>) -> Result<String> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);

        let mut claims = serde_json::Map::new();
        claims.insert("access_key".to_string(), json!(self.access_key));
        claims.insert("nonce".to_string(), json!(Uuid::new_v4().to_string()));
        if let Some(query) = query {
            let digest = Sha512::digest(query.as_bytes());
            claims.insert("query_hash".to_string(), json!(hex::encode(digest)));
            claims.insert("query_hash_alg".to_string(), json!("SHA512"));
        }
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let signing_input = format!("{header}.{payload}");
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| BotError::Unexpected(format!("invalid secret key: {e}")))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("Bearer {signing_input}.{signature}"))
    }

    async fn get_public<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(data_error(path, status));
        }

        Ok(response.json().await?)
    }

    async fn get_signed<T: DeserializeOwned>(&self, path: &str, query: Option<&str>) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = match query {
            Some(q) => format!("{}{}?{}", self.base_url, path, q),
            None => format!("{}{}", self.base_url, path),
        };
        let auth = self.auth_header(query)?;
        let response = self
            .client
            .get(&url)
            .header("Authorization", auth)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(data_error(path, status));
        }

        Ok(response.json().await?)
    }

    async fn post_order(&self, query: &str) -> Result<OrderReceipt> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v1/orders?{}", self.base_url, query);
        let auth = self.auth_header(Some(query))?;
        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(order_error(status, &body));
        }

        let dto: OrderResponseDto = response.json().await?;
        dto.into_receipt()
    }

    async fn candles(&self, path: &str, market: &str, count: u32) -> Result<Vec<Candle>> {
        let query = format!("market={market}&count={count}");
        let dtos: Vec<CandleDto> = self.get_public(path, &query).await?;
        dtos.into_iter().map(CandleDto::into_candle).collect()
    }
}

fn data_error(path: &str, status: StatusCode) -> BotError {
    BotError::Transient(format!("{path} returned HTTP {status}"))
}

fn order_error(status: StatusCode, body: &str) -> BotError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        BotError::Transient(format!("order endpoint rate limited: HTTP {status}"))
    } else {
        BotError::OrderRejected(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl super::ExchangeApi for UpbitClient {
    async fn balances(&self) -> Result<HashMap<String, f64>> {
        let accounts: Vec<AccountDto> = self.get_signed("/v1/accounts", None).await?;

        let mut balances = HashMap::new();
        for account in accounts {
            let amount = parse_f64(&account.balance, "account balance")?;
            balances.insert(account.currency, amount);
        }
        Ok(balances)
    }

    async fn best_ask(&self, market: &str) -> Result<f64> {
        let query = format!("markets={market}");
        let books: Vec<OrderbookDto> = self.get_public("/v1/orderbook", &query).await?;

        books
            .first()
            .and_then(|book| book.orderbook_units.first())
            .map(|unit| unit.ask_price)
            .ok_or_else(|| BotError::Transient(format!("empty orderbook for {market}")))
    }

    async fn daily_candles(&self, market: &str, count: u32) -> Result<Vec<Candle>> {
        self.candles("/v1/candles/days", market, count).await
    }

    async fn hourly_candles(&self, market: &str, count: u32) -> Result<Vec<Candle>> {
        self.candles("/v1/candles/minutes/60", market, count).await
    }

    async fn submit_market_buy(&self, market: &str, quote_amount: f64) -> Result<OrderReceipt> {
        let query = format!("market={market}&side=bid&price={quote_amount:.4}&ord_type=price");
        self.post_order(&query).await
    }

    async fn submit_market_sell(&self, market: &str, volume: f64) -> Result<OrderReceipt> {
        let query = format!("market={market}&side=ask&volume={volume:.8}&ord_type=market");
        self.post_order(&query).await
    }

    async fn order_status(&self, order_id: &Uuid) -> Result<OrderUpdate> {
        let query = format!("uuid={order_id}");
        let dto: OrderDetailDto = self.get_signed("/v1/order", Some(&query)).await?;
        dto.into_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExchangeApi;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> UpbitClient {
        UpbitClient::new("test-access".to_string(), "test-secret".to_string())
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn test_auth_header_shape() {
        let client = UpbitClient::new("ak".to_string(), "sk".to_string()).unwrap();

        let bearer = client.auth_header(Some("uuid=abc")).unwrap();
        let token = bearer.strip_prefix("Bearer ").unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);

        let payload = URL_SAFE_NO_PAD.decode(segments[1]).unwrap();
        let claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(claims["access_key"], "ak");
        assert!(claims["nonce"].as_str().is_some());
        assert_eq!(claims["query_hash_alg"], "SHA512");
        // SHA-512 hex digest
        assert_eq!(claims["query_hash"].as_str().unwrap().len(), 128);
    }

    #[test]
    fn test_auth_header_without_query_omits_hash() {
        let client = UpbitClient::new("ak".to_string(), "sk".to_string()).unwrap();

        let bearer = client.auth_header(None).unwrap();
        let token = bearer.strip_prefix("Bearer ").unwrap();
        let payload = URL_SAFE_NO_PAD
            .decode(token.split('.').nth(1).unwrap())
            .unwrap();
        let claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert!(claims.get("query_hash").is_none());
    }

    #[tokio::test]
    async fn test_daily_candles_parse_newest_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/candles/days")
            .match_query(Matcher::UrlEncoded("market".into(), "KRW-ETH".into()))
            .with_status(200)
            .with_body(
                r#"[
                    {"candle_date_time_utc":"2026-08-20T15:00:00","opening_price":49700.0,"high_price":50100.0,"low_price":49600.0,"trade_price":49900.0},
                    {"candle_date_time_utc":"2026-08-19T15:00:00","opening_price":49000.0,"high_price":50200.0,"low_price":49700.0,"trade_price":49750.0}
                ]"#,
            )
            .create_async()
            .await;

        let candles = client(&server).daily_candles("KRW-ETH", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp > candles[1].timestamp);
        assert_eq!(candles[1].close, 49_750.0);
        assert_eq!(candles[1].range(), 500.0);
    }

    #[tokio::test]
    async fn test_best_ask_reads_top_of_book() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/orderbook")
            .match_query(Matcher::UrlEncoded("markets".into(), "KRW-ETH".into()))
            .with_status(200)
            .with_body(
                r#"[{"orderbook_units":[{"ask_price":50100.0},{"ask_price":50200.0}]}]"#,
            )
            .create_async()
            .await;

        let ask = client(&server).best_ask("KRW-ETH").await.unwrap();
        assert_eq!(ask, 50_100.0);
    }

    #[tokio::test]
    async fn test_balances_are_signed_and_parsed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/accounts")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_string()))
            .with_status(200)
            .with_body(
                r#"[
                    {"currency":"KRW","balance":"100000.0"},
                    {"currency":"ETH","balance":"1.9"}
                ]"#,
            )
            .create_async()
            .await;

        let api = client(&server);
        let balances = api.balances().await.unwrap();

        mock.assert_async().await;
        assert_eq!(balances["KRW"], 100_000.0);
        assert_eq!(api.balance("ETH").await.unwrap(), 1.9);
        assert_eq!(api.balance("DOGE").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_rate_limited_data_call_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/orderbook")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let err = client(&server).best_ask("KRW-ETH").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_rejected_order_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/orders")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"name":"insufficient_funds_bid"}}"#)
            .create_async()
            .await;

        let err = client(&server)
            .submit_market_buy("KRW-ETH", 99_950.0)
            .await
            .unwrap_err();

        match err {
            BotError::OrderRejected(detail) => {
                assert!(detail.contains("insufficient_funds_bid"))
            }
            other => panic!("expected OrderRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_order_stays_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/orders")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let err = client(&server)
            .submit_market_buy("KRW-ETH", 99_950.0)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_submit_buy_returns_receipt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/orders")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("market".into(), "KRW-ETH".into()),
                Matcher::UrlEncoded("side".into(), "bid".into()),
                Matcher::UrlEncoded("ord_type".into(), "price".into()),
            ]))
            .with_status(201)
            .with_body(
                r#"{"uuid":"9ca023a5-851b-4fec-9f0a-48cd83c2eaae","side":"bid","ord_type":"price","price":"99950.0","volume":null}"#,
            )
            .create_async()
            .await;

        let receipt = client(&server)
            .submit_market_buy("KRW-ETH", 99_950.0)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            receipt.uuid.to_string(),
            "9ca023a5-851b-4fec-9f0a-48cd83c2eaae"
        );
        assert_eq!(receipt.requested_price, Some(99_950.0));
        assert_eq!(receipt.requested_volume, None);
    }

    #[tokio::test]
    async fn test_order_status_averages_trades() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/order")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                    "executed_volume":"1.9",
                    "trades":[
                        {"volume":"1.0","funds":"52100.0"},
                        {"volume":"0.9","funds":"46700.0"}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let update = client(&server)
            .order_status(&Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(update.executed_volume, Some(1.9));
        // 98_800 of funds over 1.9 units
        let avg = update.average_price.unwrap();
        assert!((avg - 52_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unfilled_order_status_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/order")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"executed_volume":"0.0","trades":[]}"#)
            .create_async()
            .await;

        let update = client(&server)
            .order_status(&Uuid::new_v4())
            .await
            .unwrap();

        assert!(update.executed_volume.is_none());
        assert!(update.average_price.is_none());
    }
}
