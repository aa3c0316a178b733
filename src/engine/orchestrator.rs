//! Accumulation orchestrator.
//!
//! Runs the per-pair state machine for one cycle:
//!
//! Fetch → Evaluate → Size → Gate → Execute → Done
//!
//! Pairs are evaluated concurrently and share nothing but the executor.
//! Every pair yields exactly one `PairOutcome`; no error or panic in one
//! pair reaches another.

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use rust_decimal::Decimal;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::report::{log_cycle_report, CycleReport, CycleTrigger};
use crate::environment::EnvironmentSignal;
use crate::market::{OrderExecutor, PriceFeed};
use crate::strategy::{AccumulationStrategy, StrategyConfig};
use crate::types::{
    AccumulationDecision, AssetPairConfig, Environment, OrderInstruction, Outcome, PairOutcome,
    SkipReason,
};

/// Reason recorded when a pair's evaluation panics.
pub const PANIC_REASON: &str = "evaluation_panicked";

/// Where a pair stands after the cancellable stages (Fetch through Gate).
enum Staged {
    /// Reached a terminal outcome before Execute.
    Done(PairOutcome),
    /// Passed the gate; ready to submit.
    Submit {
        decision: AccumulationDecision,
        order: OrderInstruction,
    },
}

pub struct AccumulationOrchestrator {
    feed: Arc<dyn PriceFeed>,
    executor: Arc<dyn OrderExecutor>,
    environment: Arc<dyn EnvironmentSignal>,
    strategy: AccumulationStrategy,
    history_window: usize,
    deadline: Duration,
}

impl AccumulationOrchestrator {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        executor: Arc<dyn OrderExecutor>,
        environment: Arc<dyn EnvironmentSignal>,
        config: &StrategyConfig,
        deadline: Duration,
    ) -> Self {
        Self {
            feed,
            executor,
            environment,
            strategy: AccumulationStrategy::from_config(config),
            history_window: config.history_window(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run one cycle over `pairs`. Never fails; problems become outcomes.
    pub async fn run_cycle(&self, pairs: &[AssetPairConfig], trigger: CycleTrigger) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let environment = self.environment.current();
        let deadline = Instant::now() + self.deadline;

        info!(
            cycle_id = %cycle_id,
            environment = %environment,
            past_due = trigger.past_due,
            pairs = pairs.len(),
            "Cycle starting"
        );

        let evaluations = pairs.iter().map(|pair| {
            AssertUnwindSafe(self.evaluate_pair(pair, environment, deadline))
                .catch_unwind()
                .map(move |result| match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(pair = %pair.pair, "Pair evaluation panicked");
                        PairOutcome::new(
                            &pair.pair,
                            Outcome::Failed {
                                reason: PANIC_REASON.to_string(),
                            },
                            None,
                        )
                    }
                })
        });

        let outcomes = join_all(evaluations).await;

        let report = CycleReport::new(cycle_id, trigger, environment, started_at, outcomes);
        log_cycle_report(&report);
        report
    }

    async fn evaluate_pair(
        &self,
        pair: &AssetPairConfig,
        environment: Environment,
        deadline: Instant,
    ) -> PairOutcome {
        let staged = match timeout_at(deadline, self.stage(pair, environment)).await {
            Ok(staged) => staged,
            Err(_) => {
                warn!(pair = %pair.pair, "Cycle deadline exceeded before execution");
                return PairOutcome::new(
                    &pair.pair,
                    Outcome::skipped(SkipReason::DeadlineExceeded),
                    None,
                );
            }
        };

        let (decision, order) = match staged {
            Staged::Done(outcome) => return outcome,
            Staged::Submit { decision, order } => (decision, order),
        };

        // Last chance to abandon; a started submission always runs to completion.
        if Instant::now() >= deadline {
            warn!(pair = %pair.pair, "Cycle deadline exceeded before submission");
            return PairOutcome::new(
                &pair.pair,
                Outcome::skipped(SkipReason::DeadlineExceeded),
                Some(decision),
            );
        }

        match self.executor.submit_market_buy(&order.pair, order.volume).await {
            Ok(transaction_id) => {
                info!(
                    pair = %pair.pair,
                    order = %order,
                    txid = %transaction_id,
                    fiat = %decision.fiat_amount.round_dp(8),
                    "Order executed"
                );
                PairOutcome::new(
                    &pair.pair,
                    Outcome::Executed { transaction_id },
                    Some(decision),
                )
            }
            Err(e) => {
                error!(pair = %pair.pair, order = %order, error = %e, "Order submission failed");
                PairOutcome::new(
                    &pair.pair,
                    Outcome::Failed {
                        reason: e.to_string(),
                    },
                    Some(decision),
                )
            }
        }
    }

    /// Fetch, Evaluate, Size and Gate. Cancelled as a whole on deadline.
    async fn stage(&self, pair: &AssetPairConfig, environment: Environment) -> Staged {
        let skip = |reason: SkipReason, decision: Option<AccumulationDecision>| {
            Staged::Done(PairOutcome::new(&pair.pair, Outcome::skipped(reason), decision))
        };

        // Fetch
        let fetched = tokio::try_join!(
            self.feed.price_history(&pair.pair, self.history_window),
            self.feed.current_price(&pair.pair),
            self.feed.minimum_order_volume(&pair.pair),
        );
        let (history, unit_price, exchange_min) = match fetched {
            Ok(data) => data,
            Err(e) => {
                warn!(pair = %pair.pair, error = %e, "Price feed unavailable, skipping pair");
                return skip(SkipReason::FeedUnavailable, None);
            }
        };
        if exchange_min <= Decimal::ZERO {
            warn!(
                pair = %pair.pair,
                ordermin = %exchange_min,
                "Exchange reported a non-positive minimum volume, skipping pair"
            );
            return skip(SkipReason::FeedUnavailable, None);
        }
        let sized_pair = pair.with_exchange_minimum(exchange_min);

        // Evaluate + Size
        let decision = match self.strategy.evaluate(&sized_pair, &history, unit_price) {
            Ok(decision) => decision,
            Err(e) => {
                error!(pair = %pair.pair, error = %e, "Data integrity: non-positive unit price");
                return skip(SkipReason::InvalidPrice, None);
            }
        };
        let order = match decision.to_order() {
            Some(order) => order,
            None => {
                let reason = decision.skip_reason().unwrap_or(SkipReason::ConditionsNotMet);
                debug!(pair = %pair.pair, reason = %reason, "No order sized, skipping pair");
                return skip(reason, Some(decision));
            }
        };

        // Gate
        if !environment.is_production() {
            info!(
                pair = %pair.pair,
                environment = %environment,
                order = %order,
                "Non-production environment, order not submitted"
            );
            return skip(SkipReason::NonProductionGuard, Some(decision));
        }

        Staged::Submit { decision, order }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
