//! Trend detection.
//!
//! Compares a short moving average against the long (full lookback)
//! average. The relative gap decides the direction, and its size, scaled
//! by a saturation level, gives the strength.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::debug;

use super::mean;
use crate::types::{PriceHistory, TrendDirection, TrendSignal};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Trend detector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Points in the long window (and minimum history length).
    pub lookback: usize,
    /// Points in the short window, taken from the end of the long window.
    pub short_window: usize,
    /// Relative gap the short average must clear to signal Up or Down.
    pub threshold: Decimal,
    /// Relative gap that maps to full strength.
    pub saturation: Decimal,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            lookback: 7,
            short_window: 3,
            threshold: dec!(0.01),
            saturation: dec!(0.10),
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrendDetector {
    config: TrendConfig,
}

impl TrendDetector {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Classify the recent trend. Returns Flat with zero strength when the
    /// history is shorter than the lookback window.
    pub fn detect(&self, history: &PriceHistory) -> TrendSignal {
        let lookback = self.config.lookback.max(2);
        let Some(prices) = history.last_prices(lookback) else {
            return TrendSignal::flat();
        };

        let short_len = self.config.short_window.clamp(1, lookback - 1);
        let (Some(long_avg), Some(short_avg)) =
            (mean(&prices), mean(&prices[prices.len() - short_len..]))
        else {
            return TrendSignal::flat();
        };

        if long_avg <= Decimal::ZERO {
            return TrendSignal::flat();
        }

        let gap = (short_avg - long_avg) / long_avg;
        let direction = if gap > self.config.threshold {
            TrendDirection::Up
        } else if gap < -self.config.threshold {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        };

        let strength = match direction {
            TrendDirection::Flat => Decimal::ZERO,
            _ => (gap.abs() / self.config.saturation).min(Decimal::ONE),
        };

        debug!(
            short_avg = %short_avg.round_dp(4),
            long_avg = %long_avg.round_dp(4),
            gap = %gap.round_dp(4),
            %direction,
            strength = %strength.round_dp(4),
            "Trend evaluated"
        );

        TrendSignal { direction, strength }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
