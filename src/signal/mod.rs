//! Signal types and edge computation

mod edge;

pub use edge::EdgeEngine;

use crate::market::Series;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Trading side of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Holding Yes tokens
    Yes,
    /// Holding No tokens
    No,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

/// Proposed trade direction for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    BuyYes,
    BuyNo,
    Flat,
}

impl Direction {
    /// Position side this direction opens, if any
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::BuyYes => Some(Side::Yes),
            Direction::BuyNo => Some(Side::No),
            Direction::Flat => None,
        }
    }
}

/// One tick's candidate signal
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub series: Series,
    pub direction: Direction,
    /// Signed model-vs-market edge in basis points
    pub edge_bps: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Signed edge in basis points between model probability and market price
pub fn edge_bps(model_prob: Decimal, yes_price: Decimal) -> Decimal {
    (model_prob - yes_price) * dec!(10000)
}
