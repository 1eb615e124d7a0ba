//! strike-edge: paper trading bot for Polymarket rolling BTC strike markets
//!
//! This library provides the core components for:
//! - Spot price polling from Binance
//! - Rolling 5m/15m contract discovery via the Gamma API
//! - Persistent YES-price subscriptions to the CLOB WebSocket
//! - Model-implied probability and edge computation
//! - Risk-gated signal evaluation with a process-wide kill switch
//! - Paper execution against an in-memory position ledger
//! - Append-only audit telemetry

pub mod cli;
pub mod config;
pub mod engine;
pub mod execution;
pub mod feed;
pub mod market;
pub mod model;
pub mod risk;
pub mod signal;
pub mod stream;
pub mod telemetry;
