//! Fiat → unit volume conversion with the exchange minimum-volume floor.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::info;

use crate::types::InvalidPriceError;

/// Volume reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Decimal places the exchange accepts for order volume.
    pub precision: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { precision: 8 }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeReconciler {
    config: VolumeConfig,
}

impl VolumeReconciler {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// Convert `fiat` to a unit volume at `unit_price`, truncated to the
    /// configured precision.
    ///
    /// A volume under `min_volume` is raised to exactly `min_volume`. The
    /// realised spend can then exceed `fiat`.
    pub fn reconcile(
        &self,
        fiat: Decimal,
        unit_price: Decimal,
        min_volume: Decimal,
    ) -> Result<Decimal, InvalidPriceError> {
        if unit_price <= Decimal::ZERO {
            return Err(InvalidPriceError { price: unit_price });
        }

        let raw = (fiat / unit_price)
            .round_dp_with_strategy(self.config.precision, RoundingStrategy::ToZero);

        if raw < min_volume {
            info!(
                volume = %raw,
                min_volume = %min_volume,
                "Volume below exchange minimum, raising to minimum"
            );
            return Ok(min_volume);
        }

        Ok(raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    fn reconciler() -> VolumeReconciler {
        VolumeReconciler::new(VolumeConfig::default())
    }

    #[test]
    fn test_floors_to_eight_places() {
        let volume = assert_ok!(reconciler().reconcile(dec!(4.6), dec!(30000), dec!(0.0001)));
        assert_eq!(volume, dec!(0.00015333));
    }

    #[test]
    fn test_below_minimum_is_raised_exactly() {
        let volume = assert_ok!(reconciler().reconcile(dec!(1), dec!(30000), dec!(0.0001)));
        assert_eq!(volume, dec!(0.0001));
    }

    #[test]
    fn test_never_rounds_up() {
        // 2 / 3 = 0.666… → 0.66666666, not 0.66666667
        let volume = assert_ok!(reconciler().reconcile(dec!(2), dec!(3), Decimal::ZERO));
        assert_eq!(volume, dec!(0.66666666));
    }

    #[test]
    fn test_custom_precision() {
        let r = VolumeReconciler::new(VolumeConfig { precision: 2 });
        let volume = assert_ok!(r.reconcile(dec!(10), dec!(3), dec!(0.5)));
        assert_eq!(volume, dec!(3.33));
    }

    #[test]
    fn test_result_matches_floor_or_minimum() {
        let r = reconciler();
        let min = dec!(0.0001);
        for fiat in [dec!(0.5), dec!(1), dec!(3), dec!(4.6), dec!(12), dec!(250)] {
            for price in [dec!(150), dec!(2500), dec!(30000), dec!(61234.5)] {
                let raw = (fiat / price).round_dp_with_strategy(8, RoundingStrategy::ToZero);
                let volume = r.reconcile(fiat, price, min).unwrap();
                if raw < min {
                    assert_eq!(volume, min);
                } else {
                    assert_eq!(volume, raw);
                }
            }
        }
    }

    #[test]
    fn test_non_positive_price_fails() {
        let err = assert_err!(reconciler().reconcile(dec!(4), Decimal::ZERO, dec!(0.0001)));
        assert_eq!(err.price, Decimal::ZERO);
        assert_err!(reconciler().reconcile(dec!(4), dec!(-1), dec!(0.0001)));
    }
}
