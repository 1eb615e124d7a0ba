//! Paper execution module
//!
//! In-memory position ledger with open/close/flip and PnL accounting

mod paper;

pub use paper::{Fill, FillAction, LedgerError, PaperLedger};

use crate::market::Series;
use crate::signal::Side;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// An open paper position
///
/// Pinned to the contract slug it was opened on; a position never migrates
/// across rollover.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub series: Series,
    pub slug: String,
    pub side: Side,
    /// YES price at entry
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    /// Fixed USD notional
    pub size_usd: Decimal,
}

impl Position {
    /// Token quantity implied by the fixed notional
    pub fn quantity(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.size_usd / self.entry_price
    }

    /// Unrealized PnL in USD against the latest YES quote
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        let qty = self.quantity();
        match self.side {
            Side::Yes => (mark - self.entry_price) * qty,
            Side::No => (self.entry_price - mark) * qty,
        }
    }

    pub fn held_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.entry_time
    }
}
