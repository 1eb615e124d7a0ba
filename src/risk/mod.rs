//! Risk management module
//!
//! Per-series signal gating, position exit limits, and the process-wide
//! kill switch

mod gate;
mod kill_switch;

pub use gate::{CloseReason, GateParams, RejectReason, RiskGate, Verdict};
pub use kill_switch::{KillSwitch, KillSwitchState};
