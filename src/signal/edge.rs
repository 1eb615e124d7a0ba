//! Edge evaluation

use super::{edge_bps, Direction, Signal};
use crate::market::Series;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Turns model probability vs market price into a directional signal
pub struct EdgeEngine {
    threshold_bps: Decimal,
}

impl EdgeEngine {
    pub fn new(threshold_bps: Decimal) -> Self {
        Self { threshold_bps }
    }

    /// Evaluate one tick
    ///
    /// A signal exactly at the threshold fires (>= / <= comparison).
    pub fn evaluate(
        &self,
        series: Series,
        model_prob: Decimal,
        yes_price: Decimal,
        now: DateTime<Utc>,
    ) -> Signal {
        let edge = edge_bps(model_prob, yes_price);

        let direction = if edge >= self.threshold_bps {
            Direction::BuyYes
        } else if edge <= -self.threshold_bps {
            Direction::BuyNo
        } else {
            Direction::Flat
        };

        Signal {
            series,
            direction,
            edge_bps: edge,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> EdgeEngine {
        EdgeEngine::new(dec!(800))
    }

    #[test]
    fn test_buy_yes_above_threshold() {
        let signal = engine().evaluate(Series::FiveMin, dec!(0.62), dec!(0.50), Utc::now());
        assert_eq!(signal.direction, Direction::BuyYes);
        assert_eq!(signal.edge_bps, dec!(1200));
    }

    #[test]
    fn test_buy_no_below_threshold() {
        let signal = engine().evaluate(Series::FiveMin, dec!(0.40), dec!(0.50), Utc::now());
        assert_eq!(signal.direction, Direction::BuyNo);
        assert_eq!(signal.edge_bps, dec!(-1000));
    }

    #[test]
    fn test_flat_inside_band() {
        let signal = engine().evaluate(Series::FiveMin, dec!(0.55), dec!(0.50), Utc::now());
        assert_eq!(signal.direction, Direction::Flat);
        assert_eq!(signal.edge_bps, dec!(500));
    }

    #[test]
    fn test_exactly_at_threshold_fires() {
        let signal = engine().evaluate(Series::FiveMin, dec!(0.58), dec!(0.50), Utc::now());
        assert_eq!(signal.edge_bps, dec!(800));
        assert_eq!(signal.direction, Direction::BuyYes);

        let signal = engine().evaluate(Series::FiveMin, dec!(0.42), dec!(0.50), Utc::now());
        assert_eq!(signal.edge_bps, dec!(-800));
        assert_eq!(signal.direction, Direction::BuyNo);
    }

    #[test]
    fn test_just_inside_threshold_is_flat() {
        let signal = engine().evaluate(Series::FiveMin, dec!(0.5799), dec!(0.50), Utc::now());
        assert_eq!(signal.direction, Direction::Flat);
    }

    #[test]
    fn test_series_carried_through() {
        let signal = engine().evaluate(Series::FifteenMin, dec!(0.62), dec!(0.50), Utc::now());
        assert_eq!(signal.series, Series::FifteenMin);
    }
}
