//! Exchange integrations.
//!
//! Defines the adapter traits the engine consumes and the Kraken
//! implementation of them:
//! - `PriceFeed`: current price, recent history, minimum order volume
//! - `OrderExecutor`: market buy submission
//! - `AccountClient`: balances for the status API

pub mod kraken;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::types::{ExecutionError, MarketDataUnavailable, PriceHistory, TransactionId};

/// Market data for a pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Latest traded price.
    async fn current_price(&self, pair: &str) -> Result<Decimal, MarketDataUnavailable>;

    /// Up to `window` most recent points, newest last.
    async fn price_history(
        &self,
        pair: &str,
        window: usize,
    ) -> Result<PriceHistory, MarketDataUnavailable>;

    /// Exchange minimum order volume for the pair.
    async fn minimum_order_volume(&self, pair: &str) -> Result<Decimal, MarketDataUnavailable>;
}

/// Order submission. The only call that may place real orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit_market_buy(
        &self,
        pair: &str,
        volume: Decimal,
    ) -> Result<TransactionId, ExecutionError>;
}

/// Account read access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Asset code → balance.
    async fn balances(&self) -> Result<HashMap<String, Decimal>, ExecutionError>;
}
