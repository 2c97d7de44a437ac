//! Kraken REST client
//!
//! Public OHLC data plus the signed Balance and AddOrder endpoints.

use super::signer::{NonceCounter, Signer};
use super::types::{AddOrderResult, ApiResponse};
use super::{Balance, ExchangeApi, ExchangeError, Order, OrderResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Kraken REST base URL
pub const KRAKEN_REST_URL: &str = "https://api.kraken.com";

const OHLC_PATH: &str = "/0/public/OHLC";
const BALANCE_PATH: &str = "/0/private/Balance";
const ADD_ORDER_PATH: &str = "/0/private/AddOrder";

/// Index of the close price in an OHLC row
const CLOSE_INDEX: usize = 4;

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// How far back historical requests reach
    pub lookback: Duration,
    /// Order expiry passed as `expiretm`, e.g. "+10"
    pub order_expiry: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: KRAKEN_REST_URL.to_string(),
            timeout: Duration::from_secs(10),
            lookback: Duration::from_secs(15 * 24 * 60 * 60),
            order_expiry: "+10".to_string(),
        }
    }
}

struct ApiCredentials {
    api_key: String,
    signer: Signer,
}

/// Kraken REST client
pub struct KrakenClient {
    config: RestConfig,
    http: Client,
    credentials: Option<ApiCredentials>,
    nonce: NonceCounter,
}

#[derive(Serialize)]
struct SignedBody<'a, P: Serialize> {
    nonce: u64,
    #[serde(flatten)]
    params: &'a P,
}

#[derive(Serialize)]
struct NoParams {}

#[derive(Serialize)]
struct AddOrderParams<'a> {
    ordertype: &'static str,
    #[serde(rename = "type")]
    side: &'static str,
    volume: String,
    pair: &'a str,
    price: String,
    cl_ord_id: String,
    expiretm: &'a str,
}

impl KrakenClient {
    /// Create a client for public endpoints only
    pub fn new(config: RestConfig) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            credentials: None,
            nonce: NonceCounter::from_clock(),
        })
    }

    /// Attach API credentials; the secret is decoded here, once
    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_secret: &str,
    ) -> Result<Self, ExchangeError> {
        self.credentials = Some(ApiCredentials {
            api_key: api_key.into(),
            signer: Signer::new(api_secret)?,
        });
        Ok(self)
    }

    /// Replace the nonce source
    pub fn with_nonce(mut self, nonce: NonceCounter) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Sign and POST `params` to a private endpoint
    async fn private_post<P, T>(&self, path: &str, params: &P) -> Result<T, ExchangeError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::Auth("no API credentials configured".to_string()))?;

        let nonce = self.nonce.next();
        let body = serde_json::to_string(&SignedBody { nonce, params })
            .map_err(|e| ExchangeError::Protocol(e.to_string()))?;
        let signature = creds.signer.sign(path, nonce, &body)?;

        tracing::debug!(path, nonce, "Sending private request");

        let response = self
            .http
            .post(format!("{}{}", self.config.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("API-Key", &creds.api_key)
            .header("API-Sign", signature)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ExchangeError::Exchange(format!("HTTP {}: {}", status, text)));
            }
            Err(e) => return Err(ExchangeError::Protocol(e.to_string())),
        };

        if !parsed.error.is_empty() {
            return Err(ExchangeError::from_messages(&parsed.error));
        }

        parsed
            .result
            .ok_or_else(|| ExchangeError::Protocol(format!("{}: response has no result", path)))
    }
}

#[async_trait]
impl ExchangeApi for KrakenClient {
    async fn fetch_historical_closes(
        &self,
        pair: &str,
        interval_minutes: u32,
    ) -> Result<Vec<Decimal>, ExchangeError> {
        let since = Utc::now().timestamp() - self.config.lookback.as_secs() as i64;
        let url = format!("{}{}", self.config.base_url, OHLC_PATH);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("pair", pair.to_string()),
                ("interval", interval_minutes.to_string()),
                ("since", since.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ExchangeError::DataUnavailable(e.to_string()))?;

        let body: ApiResponse<HashMap<String, serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| ExchangeError::DataUnavailable(format!("malformed OHLC payload: {}", e)))?;

        if !body.error.is_empty() {
            return Err(ExchangeError::DataUnavailable(body.error.join(", ")));
        }

        let result = body
            .result
            .ok_or_else(|| ExchangeError::DataUnavailable("OHLC response has no result".into()))?;

        let closes = parse_closes(pair, &result)?;
        tracing::debug!(pair, count = closes.len(), "Fetched historical closes");
        Ok(closes)
    }

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError> {
        let raw: HashMap<String, String> = self.private_post(BALANCE_PATH, &NoParams {}).await?;

        let mut balance = HashMap::with_capacity(raw.len());
        for (code, amount) in raw {
            let amount = Decimal::from_str(&amount).map_err(|e| {
                ExchangeError::Protocol(format!("balance for {} is not a number: {}", code, e))
            })?;
            balance.insert(code, amount);
        }
        Ok(Balance::from(balance))
    }

    async fn place_order(&self, order: &Order) -> Result<OrderResult, ExchangeError> {
        let params = AddOrderParams {
            ordertype: "limit",
            side: order.side.as_str(),
            volume: order.volume.normalize().to_string(),
            pair: &order.pair,
            price: order.price.normalize().to_string(),
            cl_ord_id: order.client_order_id.to_string(),
            expiretm: &self.config.order_expiry,
        };

        let result: AddOrderResult = self.private_post(ADD_ORDER_PATH, &params).await?;
        Ok(result.into())
    }
}

/// Extract closing prices (oldest first) from an OHLC `result` object.
///
/// The result is keyed by Kraken's canonical pair name, which may differ from
/// the requested code, alongside a `last` cursor.
fn parse_closes(
    pair: &str,
    result: &HashMap<String, serde_json::Value>,
) -> Result<Vec<Decimal>, ExchangeError> {
    let rows = result
        .get(pair)
        .and_then(|v| v.as_array())
        .or_else(|| {
            result
                .iter()
                .filter(|(key, _)| key.as_str() != "last")
                .find_map(|(_, v)| v.as_array())
        })
        .ok_or_else(|| ExchangeError::DataUnavailable(format!("no OHLC rows for {}", pair)))?;

    rows.iter()
        .map(|row| {
            let close = row
                .as_array()
                .and_then(|r| r.get(CLOSE_INDEX))
                .ok_or_else(|| ExchangeError::DataUnavailable("short OHLC row".into()))?;
            let text = match close {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(ExchangeError::DataUnavailable(format!(
                        "unexpected close value {}",
                        other
                    )))
                }
            };
            Decimal::from_str(&text)
                .map_err(|e| ExchangeError::DataUnavailable(format!("bad close {}: {}", text, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderSide;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    const SECRET: &str = "c2VjcmV0LWtleS1mb3ItdGVzdHM=";

    fn client(url: &str) -> KrakenClient {
        KrakenClient::new(RestConfig {
            base_url: url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn signed_client(url: &str) -> KrakenClient {
        client(url)
            .with_credentials("test-key", SECRET)
            .unwrap()
            .with_nonce(NonceCounter::new(1000))
    }

    #[test]
    fn test_parse_closes_canonical_key() {
        let result: HashMap<String, serde_json::Value> = serde_json::from_str(
            r#"{
                "XXBTZUSD": [
                    [1688671200, "30306.1", "30306.2", "30305.7", "30305.7", "30306.1", "3.39243896", 23],
                    [1688672100, "30305.7", "30310.0", "30300.0", "30308.4", "30305.9", "1.00000000", 12]
                ],
                "last": 1688672100
            }"#,
        )
        .unwrap();

        let closes = parse_closes("XBTUSD", &result).unwrap();
        assert_eq!(closes, vec![dec!(30305.7), dec!(30308.4)]);
    }

    #[test]
    fn test_parse_closes_malformed_row() {
        let result: HashMap<String, serde_json::Value> =
            serde_json::from_str(r#"{"XBTUSD": [[1, "2", "3"]], "last": 1}"#).unwrap();
        assert!(matches!(
            parse_closes("XBTUSD", &result),
            Err(ExchangeError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_closes_missing_pair() {
        let result: HashMap<String, serde_json::Value> =
            serde_json::from_str(r#"{"last": 1}"#).unwrap();
        assert!(parse_closes("XBTUSD", &result).is_err());
    }

    #[tokio::test]
    async fn test_fetch_historical_closes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/0/public/OHLC")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("pair".into(), "XBTUSD".into()),
                Matcher::UrlEncoded("interval".into(), "15".into()),
                Matcher::Regex("since=\\d+".into()),
            ]))
            .with_body(
                r#"{"error":[],"result":{"XXBTZUSD":[[1,"1","1","1","100.5","1","1",1],[2,"1","1","1","101.5","1","1",1]],"last":2}}"#,
            )
            .create_async()
            .await;

        let closes = client(&server.url())
            .fetch_historical_closes("XBTUSD", 15)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(closes, vec![dec!(100.5), dec!(101.5)]);
    }

    #[tokio::test]
    async fn test_fetch_historical_exchange_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/0/public/OHLC")
            .match_query(Matcher::Any)
            .with_body(r#"{"error":["EQuery:Unknown asset pair"]}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .fetch_historical_closes("NOPE", 15)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::DataUnavailable("EQuery:Unknown asset pair".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_historical_malformed_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/0/public/OHLC")
            .match_query(Matcher::Any)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let err = client(&server.url())
            .fetch_historical_closes("XBTUSD", 15)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_balance_signed() {
        let mut server = mockito::Server::new_async().await;
        let expected_sig = Signer::new(SECRET)
            .unwrap()
            .sign(BALANCE_PATH, 1001, r#"{"nonce":1001}"#)
            .unwrap();

        let mock = server
            .mock("POST", BALANCE_PATH)
            .match_header("API-Key", "test-key")
            .match_header("API-Sign", expected_sig.as_str())
            .match_body(r#"{"nonce":1001}"#)
            .with_body(r#"{"error":[],"result":{"ZUSD":"2500.00","XXBT":"0.5"}}"#)
            .create_async()
            .await;

        let balance = signed_client(&server.url()).fetch_balance().await.unwrap();

        mock.assert_async().await;
        assert_eq!(balance.get("ZUSD"), Some(dec!(2500.00)));
        assert_eq!(balance.get("XXBT"), Some(dec!(0.5)));
    }

    #[tokio::test]
    async fn test_fetch_balance_requires_credentials() {
        let err = client("http://127.0.0.1:1").fetch_balance().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Auth(_)));
    }

    #[tokio::test]
    async fn test_fetch_balance_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", BALANCE_PATH)
            .with_body(r#"{"error":["EAPI:Invalid key"]}"#)
            .create_async()
            .await;

        let err = signed_client(&server.url()).fetch_balance().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Auth(_)));
    }

    #[tokio::test]
    async fn test_place_order_body() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("POST", ADD_ORDER_PATH)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "nonce": 1001,
                "ordertype": "limit",
                "type": "buy",
                "volume": "0.02",
                "pair": "BTCUSD",
                "price": "50025",
                "cl_ord_id": id.to_string(),
                "expiretm": "+10",
            })))
            .with_body(
                r#"{"error":[],"result":{"descr":{"order":"buy 0.02 BTCUSD @ limit 50025"},"txid":["OABC-123"]}}"#,
            )
            .create_async()
            .await;

        let order = Order {
            symbol_id: "BTC".to_string(),
            pair: "BTCUSD".to_string(),
            side: OrderSide::Buy,
            price: dec!(50025.0000),
            volume: dec!(0.02000000),
            client_order_id: id,
        };
        let result = signed_client(&server.url()).place_order(&order).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.txids, vec!["OABC-123"]);
    }

    #[tokio::test]
    async fn test_place_order_insufficient_funds() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", ADD_ORDER_PATH)
            .with_body(r#"{"error":["EOrder:Insufficient funds"]}"#)
            .create_async()
            .await;

        let order = Order {
            symbol_id: "BTC".to_string(),
            pair: "BTCUSD".to_string(),
            side: OrderSide::Sell,
            price: dec!(50000),
            volume: dec!(1),
            client_order_id: Uuid::new_v4(),
        };
        let err = signed_client(&server.url())
            .place_order(&order)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Funding(_)));
    }

    #[tokio::test]
    async fn test_http_error_without_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", BALANCE_PATH)
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let err = signed_client(&server.url()).fetch_balance().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Exchange(_)));
        assert_eq!(err.class(), crate::exchange::ErrorClass::Terminal);
    }
}
