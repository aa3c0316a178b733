//! Shared types for cb0t.
//!
//! These types form the data model used across the strategy, engine, and
//! market adapter modules. Everything here is plain data: no I/O, and
//! nothing is persisted by the engine itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// A single observed price for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { timestamp, price }
    }
}

/// Ordered price series for one pair, most recent last.
///
/// Owned by a single evaluation and dropped when it finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    points: Vec<PricePoint>,
}

impl PriceHistory {
    /// Build a history, sorting points by timestamp so the newest is last.
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    /// Build a history from bare prices spaced one minute apart.
    /// Mostly useful for tests and fixtures.
    pub fn from_prices(prices: &[Decimal]) -> Self {
        let start = Utc::now() - chrono::Duration::minutes(prices.len() as i64);
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint::new(start + chrono::Duration::minutes(i as i64), *p))
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// The most recent `n` prices, oldest first. `None` if fewer than `n`
    /// points are available.
    pub fn last_prices(&self, n: usize) -> Option<Vec<Decimal>> {
        if n == 0 || self.points.len() < n {
            return None;
        }
        let start = self.points.len() - n;
        Some(self.points[start..].iter().map(|p| p.price).collect())
    }
}

// ---------------------------------------------------------------------------
// Pair configuration
// ---------------------------------------------------------------------------

/// Per-pair accumulation settings for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPairConfig {
    /// Exchange pair identifier, e.g. `XXBTZEUR`.
    pub pair: String,
    /// Target fiat to deploy per cycle before acceleration.
    pub fiat_budget: Decimal,
    /// Minimum order volume. Filled from exchange metadata at fetch time;
    /// a configured value acts as a lower bound.
    #[serde(default)]
    pub min_volume: Decimal,
}

impl AssetPairConfig {
    pub fn new(pair: &str, fiat_budget: Decimal) -> Self {
        Self {
            pair: pair.to_string(),
            fiat_budget,
            min_volume: Decimal::ZERO,
        }
    }

    /// Copy of this config with the exchange minimum applied.
    pub fn with_exchange_minimum(&self, exchange_min: Decimal) -> Self {
        Self {
            min_volume: self.min_volume.max(exchange_min),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Direction of the recent price trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "up"),
            TrendDirection::Down => write!(f, "down"),
            TrendDirection::Flat => write!(f, "flat"),
        }
    }
}

/// Trend classification with a strength in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub direction: TrendDirection,
    pub strength: Decimal,
}

impl TrendSignal {
    pub fn flat() -> Self {
        Self {
            direction: TrendDirection::Flat,
            strength: Decimal::ZERO,
        }
    }

    pub fn is_up(&self) -> bool {
        self.direction == TrendDirection::Up
    }
}

/// Local-bottom classification with a strength in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BottomSignal {
    pub reached: bool,
    pub strength: Decimal,
}

impl BottomSignal {
    pub fn not_reached() -> Self {
        Self {
            reached: false,
            strength: Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions and orders
// ---------------------------------------------------------------------------

/// Output of one pair evaluation. Never reused across pairs or cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumulationDecision {
    pub pair: String,
    pub skip: bool,
    pub fiat_amount: Decimal,
    pub volume: Decimal,
    pub unit_price: Decimal,
    pub trend: TrendSignal,
    pub bottom: BottomSignal,
    pub reason: String,
}

impl AccumulationDecision {
    /// A decision that places no order.
    pub fn skipped(
        pair: &str,
        unit_price: Decimal,
        trend: TrendSignal,
        bottom: BottomSignal,
        reason: SkipReason,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            skip: true,
            fiat_amount: Decimal::ZERO,
            volume: Decimal::ZERO,
            unit_price,
            trend,
            bottom,
            reason: reason.to_string(),
        }
    }

    /// Why no order is placed, `None` for an actionable decision.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if !self.skip {
            return None;
        }
        if self.reason == SkipReason::InvalidBudget.as_str() {
            Some(SkipReason::InvalidBudget)
        } else {
            Some(SkipReason::ConditionsNotMet)
        }
    }

    /// Order instruction for a non-skipped decision.
    pub fn to_order(&self) -> Option<OrderInstruction> {
        if self.skip {
            return None;
        }
        Some(OrderInstruction::market_buy(&self.pair, self.volume))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
        }
    }
}

/// Order ready for submission to the exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderInstruction {
    pub pair: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub volume: Decimal,
}

impl OrderInstruction {
    pub fn market_buy(pair: &str, volume: Decimal) -> Self {
        Self {
            pair: pair.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            volume,
        }
    }
}

impl fmt::Display for OrderInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.order_type, self.side, self.volume, self.pair
        )
    }
}

/// Exchange transaction identifier returned on a successful submission.
pub type TransactionId = String;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Deployment environment. Only `Prod` may submit real orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "DEV")]
    Dev,
    #[serde(rename = "PROD")]
    Prod,
}

impl Environment {
    /// Parse an environment flag. Anything other than exactly `PROD` is
    /// treated as development.
    pub fn parse(raw: &str) -> Self {
        if raw == "PROD" {
            Environment::Prod
        } else {
            Environment::Dev
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Prod
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Dev => write!(f, "DEV"),
            Environment::Prod => write!(f, "PROD"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a pair was skipped this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FeedUnavailable,
    InvalidPrice,
    ConditionsNotMet,
    InvalidBudget,
    NonProductionGuard,
    DeadlineExceeded,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::FeedUnavailable => "feed_unavailable",
            SkipReason::InvalidPrice => "invalid_price",
            SkipReason::ConditionsNotMet => "conditions_not_met",
            SkipReason::InvalidBudget => "invalid_budget",
            SkipReason::NonProductionGuard => "non_production_guard",
            SkipReason::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one pair's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Skipped { reason: SkipReason },
    Executed { transaction_id: TransactionId },
    Failed { reason: String },
}

impl Outcome {
    pub fn skipped(reason: SkipReason) -> Self {
        Outcome::Skipped { reason }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Outcome::Executed { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Outcome::Skipped { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped { reason } => write!(f, "Skipped({reason})"),
            Outcome::Executed { transaction_id } => write!(f, "Executed({transaction_id})"),
            Outcome::Failed { reason } => write!(f, "Failed({reason})"),
        }
    }
}

/// Outcome record for one configured pair in one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PairOutcome {
    pub pair: String,
    pub outcome: Outcome,
    /// The sizing decision, when evaluation got that far.
    pub decision: Option<AccumulationDecision>,
}

impl PairOutcome {
    pub fn new(pair: &str, outcome: Outcome, decision: Option<AccumulationDecision>) -> Self {
        Self {
            pair: pair.to_string(),
            outcome,
            decision,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The price feed could not supply data for a pair.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Market data unavailable for {pair}: {message}")]
pub struct MarketDataUnavailable {
    pub pair: String,
    pub message: String,
}

impl MarketDataUnavailable {
    pub fn new(pair: &str, message: impl Into<String>) -> Self {
        Self {
            pair: pair.to_string(),
            message: message.into(),
        }
    }
}

/// A non-positive unit price reached the sizing step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid unit price: {price}")]
pub struct InvalidPriceError {
    pub price: Decimal,
}

/// Order submission failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
