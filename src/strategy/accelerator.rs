//! Budget acceleration.
//!
//! Scales the per-cycle fiat budget by signal strength:
//!
//! ```text
//! fiat = base × clamp(1 + w_trend·s_trend·[trend = Up] + w_bottom·s_bottom, floor, ceiling)
//! ```
//!
//! Both weights are non-negative, so the multiplier never decreases as
//! either strength increases.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::debug;

use crate::types::{BottomSignal, TrendSignal};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Accelerator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    /// Weight of an Up trend's strength.
    pub weight_trend: Decimal,
    /// Weight of a reached bottom's strength.
    pub weight_bottom: Decimal,
    /// Lowest multiplier applied to the base budget.
    pub floor: Decimal,
    /// Highest multiplier applied to the base budget.
    pub ceiling: Decimal,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            weight_trend: dec!(0.5),
            weight_bottom: dec!(0.5),
            floor: dec!(0.25),
            ceiling: dec!(3),
        }
    }
}

// ---------------------------------------------------------------------------
// Accelerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Accelerator {
    config: AcceleratorConfig,
}

impl Accelerator {
    pub fn new(config: AcceleratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AcceleratorConfig {
        &self.config
    }

    /// Budget multiplier for the given signals, already clamped.
    pub fn multiplier(&self, trend: &TrendSignal, bottom: &BottomSignal) -> Decimal {
        let trend_term = if trend.is_up() {
            self.config.weight_trend * trend.strength
        } else {
            Decimal::ZERO
        };
        let bottom_term = if bottom.reached {
            self.config.weight_bottom * bottom.strength
        } else {
            Decimal::ZERO
        };

        (Decimal::ONE + trend_term + bottom_term).clamp(self.config.floor, self.config.ceiling)
    }

    /// Accelerated fiat amount for this cycle.
    pub fn accelerate(
        &self,
        base_fiat: Decimal,
        trend: &TrendSignal,
        bottom: &BottomSignal,
    ) -> Decimal {
        if base_fiat <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let multiplier = self.multiplier(trend, bottom);
        let fiat = base_fiat * multiplier;

        debug!(
            base = %base_fiat,
            multiplier = %multiplier.round_dp(4),
            fiat = %fiat.round_dp(8),
            "Budget accelerated"
        );

        fiat
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
