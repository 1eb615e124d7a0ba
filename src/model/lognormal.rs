//! Log-distance probability model
//!
//! P(finish above strike) = 1 - N(z) where
//! z = ln(strike/spot) / (sigma * sqrt(T)), sigma annualized.

use super::{boundary_probability, Estimator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Distance-to-strike model normalized by annualized volatility
pub struct LogNormalEstimator {
    sigma_annual: f64,
}

impl LogNormalEstimator {
    pub fn new(sigma_annual: f64) -> Self {
        Self { sigma_annual }
    }
}

impl Estimator for LogNormalEstimator {
    fn estimate(&self, spot: Decimal, strike: Decimal, secs_to_expiry: f64) -> Decimal {
        if secs_to_expiry <= 0.0 {
            return boundary_probability(spot, strike);
        }

        let s: f64 = spot.try_into().unwrap_or(0.0);
        let k: f64 = strike.try_into().unwrap_or(0.0);
        if s <= 0.0 || k <= 0.0 {
            return dec!(0.5);
        }

        // Clamp at one second so vol_t never underflows to zero
        let t_years = secs_to_expiry.max(1.0) / SECONDS_PER_YEAR;
        let vol_t = self.sigma_annual * t_years.sqrt();
        if vol_t <= 0.0 {
            return dec!(0.5);
        }

        let z = (k / s).ln() / vol_t;
        let prob = (1.0 - normal_cdf(z)).clamp(0.0, 1.0);
        Decimal::try_from(prob).unwrap_or(dec!(0.5))
    }
}

/// Standard normal CDF approximation (Abramowitz and Stegun)
fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}
