//! Paper trading ledger
//!
//! Applies risk-approved actions to in-memory positions. At most one open
//! position per series; open/close/flip either fully apply or return an
//! error without touching state.

use super::Position;
use crate::market::Series;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Ledger errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A position is already open for this series
    #[error("position already open for series")]
    PositionExists,
    /// No position to close for this series
    #[error("no open position for series")]
    NoPosition,
}

/// What a fill did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillAction {
    Open,
    Close,
}

/// A simulated fill
#[derive(Debug, Clone, Serialize)]
pub struct Fill {
    pub intent_id: Uuid,
    pub series: Series,
    pub slug: String,
    pub action: FillAction,
    pub side: Side,
    pub price: Decimal,
    pub size_usd: Decimal,
    /// Realized PnL from this fill (zero for opens)
    pub realized_delta: Decimal,
    /// Cumulative realized PnL after this fill
    pub realized_total: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// In-memory paper position ledger shared across series
pub struct PaperLedger {
    size_usd: Decimal,
    positions: HashMap<Series, Position>,
    realized_total: Decimal,
}

impl PaperLedger {
    pub fn new(size_usd: Decimal) -> Self {
        Self {
            size_usd,
            positions: HashMap::new(),
            realized_total: Decimal::ZERO,
        }
    }

    pub fn position(&self, series: Series) -> Option<&Position> {
        self.positions.get(&series)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn realized_total(&self) -> Decimal {
        self.realized_total
    }

    /// Unrealized PnL across open positions given latest marks per series
    pub fn unrealized_total(&self, marks: &HashMap<Series, Decimal>) -> Decimal {
        self.positions
            .values()
            .filter_map(|pos| marks.get(&pos.series).map(|mark| pos.unrealized_pnl(*mark)))
            .sum()
    }

    /// Open a position at the given YES price
    pub fn open(
        &mut self,
        series: Series,
        slug: &str,
        side: Side,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        if self.positions.contains_key(&series) {
            return Err(LedgerError::PositionExists);
        }

        let position = Position {
            series,
            slug: slug.to_string(),
            side,
            entry_price: price,
            entry_time: now,
            size_usd: self.size_usd,
        };
        self.positions.insert(series, position);

        Ok(Fill {
            intent_id: Uuid::new_v4(),
            series,
            slug: slug.to_string(),
            action: FillAction::Open,
            side,
            price,
            size_usd: self.size_usd,
            realized_delta: Decimal::ZERO,
            realized_total: self.realized_total,
            timestamp: now,
        })
    }

    /// Close the open position at the given YES price, realizing PnL
    pub fn close(
        &mut self,
        series: Series,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        let position = self.positions.remove(&series).ok_or(LedgerError::NoPosition)?;

        let realized_delta = position.unrealized_pnl(price);
        self.realized_total += realized_delta;

        Ok(Fill {
            intent_id: Uuid::new_v4(),
            series,
            slug: position.slug,
            action: FillAction::Close,
            side: position.side,
            price,
            size_usd: position.size_usd,
            realized_delta,
            realized_total: self.realized_total,
            timestamp: now,
        })
    }

    /// Close then reopen on the opposite side at the same price
    ///
    /// Both fills carry the same timestamp; no intermediate flat state is
    /// observable to callers.
    pub fn flip(
        &mut self,
        series: Series,
        slug: &str,
        side: Side,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Fill, Fill), LedgerError> {
        if !self.positions.contains_key(&series) {
            return Err(LedgerError::NoPosition);
        }

        let close_fill = self.close(series, price, now)?;
        let open_fill = self
            .open(series, slug, side, price, now)
            .expect("series was just closed");

        Ok((close_fill, open_fill))
    }
}
