//! Kraken spot REST integration.
//!
//! API docs: https://docs.kraken.com/api/
//! Base URL: https://api.kraken.com
//! Public endpoints (Ticker, OHLC, AssetPairs) need no auth. Private
//! endpoints (AddOrder, Balance) are signed with `API-Key` / `API-Sign`:
//! `base64(HMAC-SHA512(path ‖ SHA256(nonce ‖ postdata), base64_decode(secret)))`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::{AccountClient, OrderExecutor, PriceFeed};
use crate::config::{AppConfig, KrakenConfig};
use crate::types::{
    ExecutionError, MarketDataUnavailable, PriceHistory, PricePoint, TransactionId,
};

// ---------------------------------------------------------------------------
// API response types (Kraken JSON → Rust)
// ---------------------------------------------------------------------------

/// Every Kraken response is wrapped in `{ "error": [...], "result": {...} }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

/// Ticker entry. `c` is `[last trade price, lot volume]`.
#[derive(Debug, Deserialize)]
struct TickerInfo {
    c: Vec<String>,
}

/// Asset pair metadata. Only the fields we use.
#[derive(Debug, Deserialize)]
struct AssetPairInfo {
    #[serde(default)]
    ordermin: Option<String>,
}

/// `AddOrder` result.
#[derive(Debug, Deserialize)]
struct AddOrderResult {
    #[serde(default)]
    txid: Vec<String>,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API key pair for private endpoints.
pub struct KrakenCredentials {
    api_key: String,
    api_secret: SecretString,
}

impl KrakenCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret: SecretString::new(api_secret),
        }
    }

    /// Read credentials from the env vars named in the config.
    /// Returns `None` if either is missing or empty.
    pub fn from_env(config: &KrakenConfig) -> Option<Self> {
        let key = AppConfig::resolve_env(&config.api_key_env).ok()?;
        let secret = AppConfig::resolve_env(&config.api_secret_env).ok()?;
        if key.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(key, secret))
    }
}

impl std::fmt::Debug for KrakenCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenCredentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Kraken spot client implementing the market, order, and account adapters.
pub struct KrakenClient {
    http: Client,
    base_url: String,
    ohlc_interval_minutes: u32,
    credentials: Option<KrakenCredentials>,
    last_nonce: AtomicU64,
}

impl KrakenClient {
    /// Create a new Kraken client. Without credentials only public market
    /// data is available.
    pub fn new(config: &KrakenConfig, credentials: Option<KrakenCredentials>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("cb0t/0.1.0 (accumulation-engine)")
            .build()
            .context("Failed to build HTTP client for Kraken")?;

        if credentials.is_none() {
            debug!("Kraken client built without credentials; private endpoints disabled");
        }

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ohlc_interval_minutes: config.ohlc_interval_minutes,
            credentials,
            last_nonce: AtomicU64::new(0),
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// GET a public endpoint and unwrap the envelope.
    async fn public<T: DeserializeOwned>(
        &self,
        pair: &str,
        endpoint: &str,
        query: &str,
    ) -> std::result::Result<T, MarketDataUnavailable> {
        let url = format!("{}/0/public/{endpoint}?{query}", self.base_url);
        debug!(url = %url, "Fetching Kraken public data");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataUnavailable::new(pair, format!("{endpoint} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(MarketDataUnavailable::new(
                pair,
                format!("{endpoint} returned HTTP {status}"),
            ));
        }

        let envelope: Envelope<T> = resp.json().await.map_err(|e| {
            MarketDataUnavailable::new(pair, format!("{endpoint} response unreadable: {e}"))
        })?;

        if !envelope.error.is_empty() {
            return Err(MarketDataUnavailable::new(pair, envelope.error.join("; ")));
        }

        envelope
            .result
            .ok_or_else(|| MarketDataUnavailable::new(pair, format!("{endpoint} returned no result")))
    }

    /// Strictly increasing nonce in milliseconds since epoch.
    fn next_nonce(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_nonce.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_nonce
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// POST a signed private endpoint and unwrap the envelope.
    async fn private<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, ExecutionError> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            ExecutionError::AdapterUnavailable("Kraken credentials not configured".into())
        })?;

        let path = format!("/0/private/{endpoint}");
        let nonce = self.next_nonce();
        let post_data = encode_form(nonce, params);
        let signature = sign(&path, nonce, &post_data, creds.api_secret.expose_secret())?;

        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("API-Key", &creds.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(post_data)
            .send()
            .await
            .map_err(|e| ExecutionError::AdapterUnavailable(format!("{endpoint} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecutionError::AdapterUnavailable(format!(
                "{endpoint} returned HTTP {status}: {body}"
            )));
        }

        let envelope: Envelope<T> = resp.json().await.map_err(|e| {
            ExecutionError::AdapterUnavailable(format!("{endpoint} response unreadable: {e}"))
        })?;

        if !envelope.error.is_empty() {
            return Err(classify_errors(&envelope.error));
        }

        envelope.result.ok_or_else(|| {
            ExecutionError::AdapterUnavailable(format!("{endpoint} returned no result"))
        })
    }
}

// ---------------------------------------------------------------------------
// PriceFeed
// ---------------------------------------------------------------------------

#[async_trait]
impl PriceFeed for KrakenClient {
    async fn current_price(&self, pair: &str) -> std::result::Result<Decimal, MarketDataUnavailable> {
        let query = format!("pair={}", urlencoding::encode(pair));
        let result: HashMap<String, TickerInfo> = self.public(pair, "Ticker", &query).await?;
        parse_ticker_price(pair, &result)
    }

    async fn price_history(
        &self,
        pair: &str,
        window: usize,
    ) -> std::result::Result<PriceHistory, MarketDataUnavailable> {
        let query = format!(
            "pair={}&interval={}",
            urlencoding::encode(pair),
            self.ohlc_interval_minutes
        );
        let result: HashMap<String, serde_json::Value> = self.public(pair, "OHLC", &query).await?;
        let history = parse_ohlc(pair, &result, window)?;
        debug!(pair, points = history.len(), "OHLC history fetched");
        Ok(history)
    }

    async fn minimum_order_volume(
        &self,
        pair: &str,
    ) -> std::result::Result<Decimal, MarketDataUnavailable> {
        let query = format!("pair={}", urlencoding::encode(pair));
        let result: HashMap<String, AssetPairInfo> =
            self.public(pair, "AssetPairs", &query).await?;
        parse_ordermin(pair, &result)
    }
}

// ---------------------------------------------------------------------------
// OrderExecutor / AccountClient
// ---------------------------------------------------------------------------

#[async_trait]
impl OrderExecutor for KrakenClient {
    async fn submit_market_buy(
        &self,
        pair: &str,
        volume: Decimal,
    ) -> std::result::Result<TransactionId, ExecutionError> {
        let params = [
            ("ordertype", "market".to_string()),
            ("type", "buy".to_string()),
            ("volume", volume.normalize().to_string()),
            ("pair", pair.to_string()),
        ];

        let result: AddOrderResult = self.private("AddOrder", &params).await?;
        let txid = result.txid.into_iter().next().ok_or_else(|| {
            ExecutionError::AdapterUnavailable("AddOrder returned no transaction id".into())
        })?;

        info!(pair, volume = %volume, txid = %txid, "Kraken order accepted");
        Ok(txid)
    }
}

#[async_trait]
impl AccountClient for KrakenClient {
    async fn balances(&self) -> std::result::Result<HashMap<String, Decimal>, ExecutionError> {
        let raw: HashMap<String, String> = self.private("Balance", &[]).await?;
        raw.into_iter()
            .map(|(asset, amount)| {
                Decimal::from_str(&amount)
                    .map(|d| (asset.clone(), d))
                    .map_err(|e| {
                        ExecutionError::AdapterUnavailable(format!(
                            "Unparseable balance for {asset}: {e}"
                        ))
                    })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Parsing and signing helpers
// ---------------------------------------------------------------------------

/// Kraken keys results by its canonical pair name, which may differ from
/// the requested alias (`XBTEUR` → `XXBTZEUR`). Prefer an exact match and
/// otherwise take the single entry.
fn pick_entry<'a, T>(pair: &str, result: &'a HashMap<String, T>) -> Option<&'a T> {
    result.get(pair).or_else(|| {
        let mut entries = result.iter().filter(|(k, _)| k.as_str() != "last");
        match (entries.next(), entries.next()) {
            (Some((_, v)), None) => Some(v),
            _ => None,
        }
    })
}

fn parse_decimal(pair: &str, field: &str, raw: &str) -> std::result::Result<Decimal, MarketDataUnavailable> {
    Decimal::from_str(raw)
        .map_err(|e| MarketDataUnavailable::new(pair, format!("invalid {field} '{raw}': {e}")))
}

fn parse_ticker_price(
    pair: &str,
    result: &HashMap<String, TickerInfo>,
) -> std::result::Result<Decimal, MarketDataUnavailable> {
    let ticker = pick_entry(pair, result)
        .ok_or_else(|| MarketDataUnavailable::new(pair, "pair missing from ticker"))?;
    let last = ticker
        .c
        .first()
        .ok_or_else(|| MarketDataUnavailable::new(pair, "ticker has no last trade"))?;
    parse_decimal(pair, "last trade price", last)
}

/// OHLC rows are `[time, open, high, low, close, vwap, volume, count]`.
/// The close price of each row becomes one history point.
fn parse_ohlc(
    pair: &str,
    result: &HashMap<String, serde_json::Value>,
    window: usize,
) -> std::result::Result<PriceHistory, MarketDataUnavailable> {
    let rows = pick_entry(pair, result)
        .and_then(|v| v.as_array())
        .ok_or_else(|| MarketDataUnavailable::new(pair, "pair missing from OHLC"))?;

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let time = row
            .get(0)
            .and_then(|t| t.as_i64())
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
            .ok_or_else(|| MarketDataUnavailable::new(pair, "OHLC row has no timestamp"))?;
        let close = row
            .get(4)
            .and_then(|c| c.as_str())
            .ok_or_else(|| MarketDataUnavailable::new(pair, "OHLC row has no close"))?;
        points.push(PricePoint::new(time, parse_decimal(pair, "close", close)?));
    }

    let history = PriceHistory::new(points);
    let keep = history.len().min(window);
    let start = history.len() - keep;
    Ok(PriceHistory::new(history.points()[start..].to_vec()))
}

fn parse_ordermin(
    pair: &str,
    result: &HashMap<String, AssetPairInfo>,
) -> std::result::Result<Decimal, MarketDataUnavailable> {
    let info = pick_entry(pair, result)
        .ok_or_else(|| MarketDataUnavailable::new(pair, "pair missing from asset pairs"))?;
    let raw = info
        .ordermin
        .as_deref()
        .ok_or_else(|| MarketDataUnavailable::new(pair, "asset pair has no ordermin"))?;
    parse_decimal(pair, "ordermin", raw)
}

/// URL-encoded form body with the nonce first.
fn encode_form(nonce: u64, params: &[(&str, String)]) -> String {
    let mut body = format!("nonce={nonce}");
    for (key, value) in params {
        body.push('&');
        body.push_str(key);
        body.push('=');
        body.push_str(&urlencoding::encode(value));
    }
    body
}

fn sign(
    path: &str,
    nonce: u64,
    post_data: &str,
    secret_b64: &str,
) -> std::result::Result<String, ExecutionError> {
    let mut sha = Sha256::new();
    sha.update(nonce.to_string().as_bytes());
    sha.update(post_data.as_bytes());
    let digest = sha.finalize();

    let key = STANDARD
        .decode(secret_b64)
        .map_err(|e| ExecutionError::AdapterUnavailable(format!("Invalid API secret: {e}")))?;
    let mut mac = Hmac::<Sha512>::new_from_slice(&key)
        .map_err(|e| ExecutionError::AdapterUnavailable(format!("Invalid API secret: {e}")))?;
    mac.update(path.as_bytes());
    mac.update(&digest);

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Order-level problems are rejections; anything else means the exchange
/// could not process the call.
fn classify_errors(errors: &[String]) -> ExecutionError {
    let joined = errors.join("; ");
    let rejected = errors.iter().any(|e| {
        e.starts_with("EOrder:")
            || e.starts_with("EFunding:")
            || e.starts_with("EGeneral:Invalid arguments")
    });
    if rejected {
        ExecutionError::OrderRejected { reason: joined }
    } else {
        ExecutionError::AdapterUnavailable(joined)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
