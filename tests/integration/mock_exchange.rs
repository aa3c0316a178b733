//! Mock exchange for integration testing.
//!
//! Implements `PriceFeed`, `OrderExecutor` and `AccountClient` in memory.
//! Prices, minimums and failures are controllable from test code, and
//! every submitted order is recorded.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use cb0t::market::{AccountClient, OrderExecutor, PriceFeed};
use cb0t::types::{ExecutionError, MarketDataUnavailable, PriceHistory, TransactionId};

/// Down then retesting the low: a bottom is reached.
pub const BOTTOM: [i64; 7] = [100, 98, 95, 90, 88, 89, 91];
/// Steady climb: an Up trend.
pub const RISING: [i64; 7] = [90, 91, 93, 95, 98, 101, 104];
/// Steady decline: nothing favorable.
pub const FALLING: [i64; 7] = [100, 99, 98, 97, 96, 95, 94];

struct Market {
    history: Vec<Decimal>,
    price: Decimal,
    ordermin: Decimal,
}

pub struct MockExchange {
    markets: Mutex<HashMap<String, Market>>,
    balances: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<Vec<(String, Decimal)>>,
    /// Pairs whose market data calls fail.
    feed_down: Mutex<HashSet<String>>,
    /// If set, every order submission fails with this error.
    order_error: Mutex<Option<ExecutionError>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            markets: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::from([("ZEUR".to_string(), dec!(250))])),
            orders: Mutex::new(Vec::new()),
            feed_down: Mutex::new(HashSet::new()),
            order_error: Mutex::new(None),
        }
    }

    /// List a pair with daily closes `history` and current `price`.
    pub fn with_market(self, pair: &str, history: &[i64], price: Decimal) -> Self {
        self.markets.lock().unwrap().insert(
            pair.to_string(),
            Market {
                history: history.iter().map(|p| Decimal::from(*p)).collect(),
                price,
                ordermin: dec!(0.0001),
            },
        );
        self
    }

    pub fn set_ordermin(&self, pair: &str, ordermin: Decimal) {
        if let Some(market) = self.markets.lock().unwrap().get_mut(pair) {
            market.ordermin = ordermin;
        }
    }

    pub fn set_feed_down(&self, pair: &str) {
        self.feed_down.lock().unwrap().insert(pair.to_string());
    }

    pub fn set_order_error(&self, error: ExecutionError) {
        *self.order_error.lock().unwrap() = Some(error);
    }

    pub fn clear_errors(&self) {
        self.feed_down.lock().unwrap().clear();
        *self.order_error.lock().unwrap() = None;
    }

    /// All orders accepted so far, as (pair, volume).
    pub fn orders(&self) -> Vec<(String, Decimal)> {
        self.orders.lock().unwrap().clone()
    }

    fn market<T>(
        &self,
        pair: &str,
        read: impl FnOnce(&Market) -> T,
    ) -> Result<T, MarketDataUnavailable> {
        if self.feed_down.lock().unwrap().contains(pair) {
            return Err(MarketDataUnavailable::new(pair, "HTTP 503 Service Unavailable"));
        }
        let markets = self.markets.lock().unwrap();
        let market = markets
            .get(pair)
            .ok_or_else(|| MarketDataUnavailable::new(pair, "EQuery:Unknown asset pair"))?;
        Ok(read(market))
    }
}

#[async_trait]
impl PriceFeed for MockExchange {
    async fn current_price(&self, pair: &str) -> Result<Decimal, MarketDataUnavailable> {
        self.market(pair, |m| m.price)
    }

    async fn price_history(
        &self,
        pair: &str,
        window: usize,
    ) -> Result<PriceHistory, MarketDataUnavailable> {
        self.market(pair, |m| {
            let start = m.history.len().saturating_sub(window);
            PriceHistory::from_prices(&m.history[start..])
        })
    }

    async fn minimum_order_volume(&self, pair: &str) -> Result<Decimal, MarketDataUnavailable> {
        self.market(pair, |m| m.ordermin)
    }
}

#[async_trait]
impl OrderExecutor for MockExchange {
    async fn submit_market_buy(
        &self,
        pair: &str,
        volume: Decimal,
    ) -> Result<TransactionId, ExecutionError> {
        if let Some(err) = self.order_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push((pair.to_string(), volume));
        Ok(format!("MOCK-TX-{:04}", orders.len()))
    }
}

#[async_trait]
impl AccountClient for MockExchange {
    async fn balances(&self) -> Result<HashMap<String, Decimal>, ExecutionError> {
        Ok(self.balances.lock().unwrap().clone())
    }
}
