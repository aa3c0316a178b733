//! Local-bottom detection.
//!
//! A bottom is a trough inside the lookback window: price fell into the
//! window minimum, the minimum is behind us, and the current price is still
//! close to it. Strength grows with the discount of the current price to
//! the window average.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::debug;

use super::mean;
use crate::types::{BottomSignal, PriceHistory};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bottom detector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BottomConfig {
    /// Points considered (and minimum history length).
    pub lookback: usize,
    /// Max distance of the current price from the window minimum, as a
    /// fraction of the minimum.
    pub tolerance: Decimal,
    /// Required drop from the first window price into the minimum, as a
    /// fraction of the first price.
    pub min_decline: Decimal,
    /// Discount to the window average that maps to full strength.
    pub saturation: Decimal,
}

impl Default for BottomConfig {
    fn default() -> Self {
        Self {
            lookback: 7,
            tolerance: dec!(0.05),
            min_decline: dec!(0.01),
            saturation: dec!(0.10),
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BottomDetector {
    config: BottomConfig,
}

impl BottomDetector {
    pub fn new(config: BottomConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BottomConfig {
        &self.config
    }

    /// Decide whether the latest price sits in a local trough.
    pub fn detect(&self, history: &PriceHistory) -> BottomSignal {
        let lookback = self.config.lookback.max(2);
        let Some(prices) = history.last_prices(lookback) else {
            return BottomSignal::not_reached();
        };

        let last_idx = prices.len() - 1;
        let current = prices[last_idx];

        // Earliest occurrence wins on ties, so a retest of an earlier low
        // still counts as a trough.
        let (min_idx, min_price) = prices
            .iter()
            .copied()
            .enumerate()
            .fold((0, prices[0]), |(bi, bp), (i, p)| if p < bp { (i, p) } else { (bi, bp) });

        if min_price <= Decimal::ZERO {
            return BottomSignal::not_reached();
        }

        let near_minimum = (current - min_price).abs() <= min_price * self.config.tolerance;

        // Minimum must be strictly inside the window: something fell into
        // it, and it is not the latest print (still falling).
        let first = prices[0];
        let declined_into_min = min_idx > 0
            && min_idx < last_idx
            && (first - min_price) / first > self.config.min_decline;

        if !(near_minimum && declined_into_min) {
            debug!(
                min_idx,
                min_price = %min_price,
                current = %current,
                near_minimum,
                declined_into_min,
                "No bottom"
            );
            return BottomSignal::not_reached();
        }

        let strength = match mean(&prices) {
            Some(avg) if avg > Decimal::ZERO => {
                let discount = (avg - current) / avg;
                (discount / self.config.saturation).clamp(Decimal::ZERO, Decimal::ONE)
            }
            _ => Decimal::ZERO,
        };

        debug!(
            min_idx,
            min_price = %min_price,
            current = %current,
            strength = %strength.round_dp(4),
            "Bottom reached"
        );

        BottomSignal {
            reached: true,
            strength,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
