//! Accumulation strategy: trend and bottom detection, budget acceleration,
//! and volume reconciliation.
//!
//! Everything under this module is pure: no I/O and no shared state. The
//! engine feeds it a fresh price history per pair per cycle.

pub mod accelerator;
pub mod bottom;
pub mod trend;
pub mod volume;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::{AccumulationDecision, AssetPairConfig, InvalidPriceError, PriceHistory, SkipReason};
use accelerator::{Accelerator, AcceleratorConfig};
use bottom::{BottomConfig, BottomDetector};
use trend::{TrendConfig, TrendDetector};
use volume::{VolumeConfig, VolumeReconciler};

/// Arithmetic mean, `None` for an empty slice.
pub(crate) fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len()))
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Combined strategy settings (the `[engine]` config section).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub trend: TrendConfig,
    pub bottom: BottomConfig,
    pub accelerator: AcceleratorConfig,
    pub volume: VolumeConfig,
}

impl StrategyConfig {
    /// Number of history points the detectors need.
    pub fn history_window(&self) -> usize {
        self.trend.lookback.max(self.bottom.lookback)
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Pipelines trend + bottom detection → acceleration → volume sizing.
#[derive(Debug, Clone)]
pub struct AccumulationStrategy {
    trend: TrendDetector,
    bottom: BottomDetector,
    accelerator: Accelerator,
    reconciler: VolumeReconciler,
}

impl AccumulationStrategy {
    pub fn new(
        trend: TrendDetector,
        bottom: BottomDetector,
        accelerator: Accelerator,
        reconciler: VolumeReconciler,
    ) -> Self {
        Self {
            trend,
            bottom,
            accelerator,
            reconciler,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            TrendDetector::new(config.trend.clone()),
            BottomDetector::new(config.bottom.clone()),
            Accelerator::new(config.accelerator.clone()),
            VolumeReconciler::new(config.volume.clone()),
        )
    }

    /// Evaluate one pair.
    ///
    /// Returns a skipped decision when neither an Up trend nor a bottom is
    /// present, or when the accelerated budget is not positive. Otherwise
    /// returns a sized decision whose volume is at least `pair.min_volume`.
    /// Fails only on a non-positive unit price.
    pub fn evaluate(
        &self,
        pair: &AssetPairConfig,
        history: &PriceHistory,
        unit_price: Decimal,
    ) -> Result<AccumulationDecision, InvalidPriceError> {
        let trend = self.trend.detect(history);
        let bottom = self.bottom.detect(history);

        if !(trend.is_up() || bottom.reached) {
            debug!(
                pair = %pair.pair,
                trend = %trend.direction,
                "Trend and bottom conditions not met"
            );
            return Ok(AccumulationDecision::skipped(
                &pair.pair,
                unit_price,
                trend,
                bottom,
                SkipReason::ConditionsNotMet,
            ));
        }

        let fiat = self.accelerator.accelerate(pair.fiat_budget, &trend, &bottom);
        if fiat <= Decimal::ZERO {
            warn!(
                pair = %pair.pair,
                budget = %pair.fiat_budget,
                "Non-positive fiat budget, nothing to buy"
            );
            return Ok(AccumulationDecision::skipped(
                &pair.pair,
                unit_price,
                trend,
                bottom,
                SkipReason::InvalidBudget,
            ));
        }
        let volume = self.reconciler.reconcile(fiat, unit_price, pair.min_volume)?;

        let reason = match (trend.is_up(), bottom.reached) {
            (true, true) => "trend_up_and_bottom",
            (true, false) => "trend_up",
            _ => "bottom_reached",
        };

        info!(
            pair = %pair.pair,
            trend = %trend.direction,
            trend_strength = %trend.strength.round_dp(4),
            bottom = bottom.reached,
            bottom_strength = %bottom.strength.round_dp(4),
            fiat = %fiat.round_dp(8),
            volume = %volume,
            unit_price = %unit_price,
            "Accumulation sized"
        );

        Ok(AccumulationDecision {
            pair: pair.pair.clone(),
            skip: false,
            fiat_amount: fiat,
            volume,
            unit_price,
            trend,
            bottom,
            reason: reason.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
