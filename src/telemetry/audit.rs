//! Append-only audit trail
//!
//! Every market rollover, per-tick snapshot, paper order, and periodic PnL
//! summary lands here as one self-describing JSON line. Append is the only
//! operation; records are never edited or removed.

use crate::execution::FillAction;
use crate::market::Series;
use crate::risk::CloseReason;
use crate::signal::{Direction, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// One audit trail entry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    /// The active contract for a series changed
    MarketRoll {
        ts: DateTime<Utc>,
        series: Series,
        prev_slug: Option<String>,
        slug: String,
        strike: Decimal,
        expiry: DateTime<Utc>,
    },
    /// Per-tick evaluation snapshot, emitted whether or not a trade results
    SeriesSnapshot {
        ts: DateTime<Utc>,
        series: Series,
        slug: String,
        spot: Option<Decimal>,
        strike: Decimal,
        yes_price: Option<Decimal>,
        model_prob: Option<Decimal>,
        edge_bps: Option<Decimal>,
        direction: Option<Direction>,
        tte_s: f64,
        decision: String,
    },
    /// A paper order was applied to the ledger
    PaperSubmit {
        ts: DateTime<Utc>,
        series: Series,
        slug: String,
        intent_id: Uuid,
        action: FillAction,
        side: Side,
        price: Decimal,
        size_usd: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        close_reason: Option<CloseReason>,
        realized_delta: Decimal,
        realized_total: Decimal,
    },
    /// Periodic PnL and loop-health summary across all series
    TelemetrySnapshot {
        ts: DateTime<Utc>,
        realized_total: Decimal,
        unrealized_total: Decimal,
        open_positions: usize,
        loops: u64,
        submits: u64,
        rejects: u64,
        reject_rate: f64,
        p95_submit_ms: Option<f64>,
        kill_switch: bool,
    },
}

/// Append-only JSONL sink
pub struct AuditLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLogger {
    /// Open (or create) the audit file under `dir`
    pub fn new(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join("trade_audit.jsonl");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record
    ///
    /// Failures are logged and swallowed: the audit sink must never halt a
    /// series pipeline.
    pub fn append(&self, record: &AuditRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize audit record");
                return;
            }
        };

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to append audit record");
        }
    }
}
