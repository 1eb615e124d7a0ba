//! Telemetry module
//!
//! Structured logging, the append-only audit trail, and loop metrics

mod audit;
mod logging;
mod metrics;

pub use audit::{AuditLogger, AuditRecord};
pub use logging::init_logging;
pub use metrics::{AlertThresholds, LoopMetrics, MetricsSnapshot, PercentileSummary};

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level)
}
