//! Probability model module
//!
//! Maps (spot, strike, time-to-expiry) to the model-implied probability of
//! finishing above strike. The pipeline depends only on the [`Estimator`]
//! contract, never on a specific formula; the variant is picked at startup
//! from configuration.

mod lognormal;
mod threshold;

pub use lognormal::LogNormalEstimator;
pub use threshold::ThresholdEstimator;

use crate::config::{ModelConfig, ModelKind};
use rust_decimal::Decimal;

/// Trait for probability model implementations
///
/// Implementations must be monotonic in spot and degenerate correctly at
/// expiry: as seconds_to_expiry approaches 0 the probability goes to 1 for
/// spot > strike and 0 for spot < strike, with 0.5 at the tie.
pub trait Estimator: Send + Sync {
    /// Probability in [0, 1] that spot finishes above strike
    fn estimate(&self, spot: Decimal, strike: Decimal, secs_to_expiry: f64) -> Decimal;
}

/// Build the configured estimator
pub fn build_estimator(config: &ModelConfig) -> Box<dyn Estimator> {
    match config.kind {
        ModelKind::Lognormal => Box::new(LogNormalEstimator::new(config.sigma_annual)),
        ModelKind::Threshold => Box::new(ThresholdEstimator),
    }
}

/// Expiry-boundary probability shared by all variants
pub(crate) fn boundary_probability(spot: Decimal, strike: Decimal) -> Decimal {
    use rust_decimal_macros::dec;
    if spot > strike {
        Decimal::ONE
    } else if spot < strike {
        Decimal::ZERO
    } else {
        dec!(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_lognormal() {
        let config = ModelConfig {
            kind: ModelKind::Lognormal,
            sigma_annual: 0.8,
        };
        let model = build_estimator(&config);
        let p = model.estimate(dec!(67000), dec!(66900), 120.0);
        assert!(p > dec!(0.5) && p < Decimal::ONE);
    }

    #[test]
    fn test_build_threshold() {
        let config = ModelConfig {
            kind: ModelKind::Threshold,
            sigma_annual: 0.8,
        };
        let model = build_estimator(&config);
        assert_eq!(model.estimate(dec!(67000), dec!(66900), 120.0), Decimal::ONE);
    }

    #[test]
    fn test_boundary_probability() {
        assert_eq!(boundary_probability(dec!(2), dec!(1)), Decimal::ONE);
        assert_eq!(boundary_probability(dec!(1), dec!(2)), Decimal::ZERO);
        assert_eq!(boundary_probability(dec!(1), dec!(1)), dec!(0.5));
    }
}
