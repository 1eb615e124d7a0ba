//! Step-function probability model

use super::{boundary_probability, Estimator};
use rust_decimal::Decimal;

/// Pure threshold model: certain above strike, impossible below, coin flip
/// at the tie. Useful as a degenerate baseline against the volatility model.
pub struct ThresholdEstimator;

impl Estimator for ThresholdEstimator {
    fn estimate(&self, spot: Decimal, strike: Decimal, _secs_to_expiry: f64) -> Decimal {
        boundary_probability(spot, strike)
    }
}
