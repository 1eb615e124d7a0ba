//! Market discovery module
//!
//! Finds and tracks the active rolling contract per series via the Gamma API

mod gamma;
mod resolver;

pub use gamma::{GammaClient, GammaConfig};
pub use resolver::{spawn_resolver, ResolverHandle, SeriesResolver};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rolling contract cadence, tracked independently per series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Series {
    #[serde(rename = "5m")]
    FiveMin,
    #[serde(rename = "15m")]
    FifteenMin,
}

impl Series {
    /// Short label used in logs and audit records
    pub fn label(&self) -> &'static str {
        match self {
            Series::FiveMin => "5m",
            Series::FifteenMin => "15m",
        }
    }

    /// Contract window length
    pub fn window(&self) -> Duration {
        match self {
            Series::FiveMin => Duration::minutes(5),
            Series::FifteenMin => Duration::minutes(15),
        }
    }

    pub fn all() -> [Series; 2] {
        [Series::FiveMin, Series::FifteenMin]
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Startup-time parameters for one series
#[derive(Debug, Clone)]
pub struct SeriesSpec {
    pub series: Series,
    pub slug_prefix: String,
    pub seed_slug: String,
    pub min_hold: Duration,
}

/// One rolling binary contract window
///
/// Immutable; a rollover produces a new Contract, never mutates the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub series: Series,
    pub slug: String,
    pub condition_id: String,
    pub question: String,
    pub strike: Decimal,
    pub expiry: DateTime<Utc>,
    pub yes_token_id: String,
    pub no_token_id: String,
}

impl Contract {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    /// Seconds until expiry, clamped at zero
    pub fn secs_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        let ms = (self.expiry - now).num_milliseconds();
        (ms.max(0) as f64) / 1000.0
    }
}

/// Market discovery errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Discovery request failed; retried on the next refresh
    #[error("discovery request failed: {0}")]
    Discovery(String),
    /// Contract metadata is missing a required field; the series tick is skipped
    #[error("market metadata incomplete: {0}")]
    MetadataIncomplete(String),
    /// No active contract matches the series prefix right now
    #[error("no active contract for prefix {0}")]
    NoActiveContract(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_series_labels() {
        assert_eq!(Series::FiveMin.label(), "5m");
        assert_eq!(Series::FifteenMin.label(), "15m");
        assert_eq!(Series::FiveMin.to_string(), "5m");
    }

    #[test]
    fn test_series_windows() {
        assert_eq!(Series::FiveMin.window(), Duration::minutes(5));
        assert_eq!(Series::FifteenMin.window(), Duration::minutes(15));
    }

    #[test]
    fn test_series_serde_rename() {
        assert_eq!(serde_json::to_string(&Series::FiveMin).unwrap(), "\"5m\"");
        assert_eq!(
            serde_json::from_str::<Series>("\"15m\"").unwrap(),
            Series::FifteenMin
        );
    }

    #[test]
    fn test_contract_expiry() {
        let now = Utc::now();
        let contract = Contract {
            series: Series::FiveMin,
            slug: "btc-updown-5m-1771549800".to_string(),
            condition_id: "0x123".to_string(),
            question: "Will BTC be above $67,000?".to_string(),
            strike: dec!(67000),
            expiry: now + Duration::seconds(90),
            yes_token_id: "yes".to_string(),
            no_token_id: "no".to_string(),
        };

        assert!(!contract.is_expired(now));
        assert!(contract.is_expired(now + Duration::seconds(90)));
        let tte = contract.secs_to_expiry(now);
        assert!((tte - 90.0).abs() < 0.01);
        assert_eq!(contract.secs_to_expiry(now + Duration::minutes(10)), 0.0);
    }
}
