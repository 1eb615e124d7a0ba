//! Per-series risk gate
//!
//! Stateful gate between candidate signals and the paper ledger. Enforces
//! minimum hold, signal cooldown, stop-loss/take-profit exits, and the kill
//! switch. Exit checks run every tick before the candidate is considered,
//! so a breached limit closes even when the tick's signal agrees with the
//! open position.

use super::KillSwitch;
use crate::execution::Position;
use crate::signal::{Side, Signal};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Why a position was force-closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    /// Close leg of a direction flip
    Flip,
    /// Contract retired under the position
    Rollover,
}

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    KillSwitch,
    MinHold,
    Cooldown,
}

/// Gate decision for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Open a new position
    Open(Side),
    /// Force-close the open position
    ForceClose(CloseReason),
    /// Close then open the opposite side
    Flip(Side),
    /// Keep the open position as is
    Hold,
    /// Candidate rejected
    Reject(RejectReason),
    /// No position, no candidate
    NoAction,
}

/// Limits applied by the gate
#[derive(Debug, Clone)]
pub struct GateParams {
    pub stop_loss_usd: Decimal,
    pub take_profit_usd: Decimal,
    pub max_cumulative_loss_usd: Decimal,
    pub min_hold: Duration,
    pub cooldown: Duration,
    pub fatal_staleness: Duration,
}

/// Stateful per-series gate
pub struct RiskGate {
    params: GateParams,
    kill: Arc<KillSwitch>,
    last_open_at: Option<DateTime<Utc>>,
    spot_down_since: Option<DateTime<Utc>>,
    stream_down_since: Option<DateTime<Utc>>,
}

impl RiskGate {
    pub fn new(params: GateParams, kill: Arc<KillSwitch>) -> Self {
        Self {
            params,
            kill,
            last_open_at: None,
            spot_down_since: None,
            stream_down_since: None,
        }
    }

    /// Evaluate the decision table for one tick
    ///
    /// `mark` is the latest YES quote for the active contract.
    pub fn evaluate(
        &self,
        candidate: &Signal,
        position: Option<&Position>,
        mark: Decimal,
        now: DateTime<Utc>,
    ) -> Verdict {
        // Limit exits take priority over everything, including hold time
        // and the kill switch (closes stay permitted).
        if let Some(pos) = position {
            let pnl = pos.unrealized_pnl(mark);
            if pnl <= -self.params.stop_loss_usd {
                return Verdict::ForceClose(CloseReason::StopLoss);
            }
            if pnl >= self.params.take_profit_usd {
                return Verdict::ForceClose(CloseReason::TakeProfit);
            }
        }

        match (position, candidate.direction.side()) {
            (None, None) => Verdict::NoAction,
            (None, Some(side)) => {
                if self.kill.is_active() {
                    return Verdict::Reject(RejectReason::KillSwitch);
                }
                if self.in_cooldown(now) {
                    return Verdict::Reject(RejectReason::Cooldown);
                }
                Verdict::Open(side)
            }
            (Some(_), None) => Verdict::Hold,
            (Some(pos), Some(side)) if side == pos.side => Verdict::Hold,
            (Some(pos), Some(side)) => {
                if pos.held_for(now) < self.params.min_hold {
                    return Verdict::Reject(RejectReason::MinHold);
                }
                // A flip opens a new position; the kill switch blocks it
                if self.kill.is_active() {
                    return Verdict::Reject(RejectReason::KillSwitch);
                }
                if self.in_cooldown(now) {
                    return Verdict::Reject(RejectReason::Cooldown);
                }
                Verdict::Flip(side)
            }
        }
    }

    /// Record an approved open for cooldown tracking
    pub fn note_open(&mut self, now: DateTime<Utc>) {
        self.last_open_at = Some(now);
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_open_at
            .map(|t| now - t < self.params.cooldown)
            .unwrap_or(false)
    }

    /// Track feed availability; a feed down past the fatal bound trips the
    /// kill switch
    pub fn observe_feeds(&mut self, spot_up: bool, stream_up: bool, now: DateTime<Utc>) {
        Self::observe_one(
            &mut self.spot_down_since,
            spot_up,
            now,
            self.params.fatal_staleness,
            &self.kill,
            "spot_feed_staleness",
        );
        Self::observe_one(
            &mut self.stream_down_since,
            stream_up,
            now,
            self.params.fatal_staleness,
            &self.kill,
            "contract_stream_staleness",
        );
    }

    fn observe_one(
        down_since: &mut Option<DateTime<Utc>>,
        up: bool,
        now: DateTime<Utc>,
        fatal: Duration,
        kill: &KillSwitch,
        reason: &str,
    ) {
        if up {
            *down_since = None;
            return;
        }
        let since = *down_since.get_or_insert(now);
        if now - since >= fatal {
            kill.activate(reason);
        }
    }

    /// Cumulative realized loss across all series trips the kill switch
    pub fn observe_realized(&self, realized_total: Decimal) {
        if realized_total <= -self.params.max_cumulative_loss_usd {
            self.kill.activate("cumulative_loss_breach");
        }
    }
}
