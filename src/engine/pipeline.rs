//! Per-series evaluation pipeline
//!
//! One tick: confirm/rotate the active contract, take the latest spot and
//! YES quotes, compute model probability and edge, run the risk gate, apply
//! the approved action to the ledger, and record everything in the audit
//! trail. Ticks for one series never overlap; the pipeline task owns all of
//! its mutable state.

use crate::execution::{Fill, PaperLedger};
use crate::feed::{ReferenceFeedHandle, SpotView};
use crate::market::{Contract, ResolverHandle, SeriesSpec, Series};
use crate::model::Estimator;
use crate::risk::{CloseReason, RiskGate, Verdict};
use crate::signal::{EdgeEngine, Signal};
use crate::stream::{StreamHandle, StreamView, YesQuote};
use crate::telemetry::{AuditLogger, AuditRecord, LoopMetrics};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The decision pipeline for one series
pub struct SeriesPipeline {
    spec: SeriesSpec,
    estimator: Arc<dyn Estimator>,
    edge: EdgeEngine,
    gate: RiskGate,
    ledger: Arc<Mutex<PaperLedger>>,
    metrics: Arc<LoopMetrics>,
    audit: Arc<AuditLogger>,
    active: Option<Contract>,
    /// Last quote seen for the active contract; prices rollover force-closes
    last_yes: Option<YesQuote>,
}

impl SeriesPipeline {
    pub fn new(
        spec: SeriesSpec,
        estimator: Arc<dyn Estimator>,
        edge: EdgeEngine,
        gate: RiskGate,
        ledger: Arc<Mutex<PaperLedger>>,
        metrics: Arc<LoopMetrics>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            spec,
            estimator,
            edge,
            gate,
            ledger,
            metrics,
            audit,
            active: None,
            last_yes: None,
        }
    }

    pub fn series(&self) -> Series {
        self.spec.series
    }

    pub fn active_contract(&self) -> Option<&Contract> {
        self.active.as_ref()
    }

    /// True when the held contract has expired and resolution should be
    /// triggered out of cycle
    pub fn needs_resolution(&self, now: DateTime<Utc>) -> bool {
        self.active
            .as_ref()
            .map(|c| c.is_expired(now))
            .unwrap_or(false)
    }

    /// Run one evaluation tick from immutable source snapshots
    pub fn process_tick(
        &mut self,
        now: DateTime<Utc>,
        started: Instant,
        resolved: Option<&Contract>,
        spot: &SpotView,
        stream: &StreamView,
    ) {
        self.metrics.record_loop();

        if let Some(new_contract) = resolved {
            let rolled = self
                .active
                .as_ref()
                .map(|c| c.slug != new_contract.slug)
                .unwrap_or(true);
            if rolled {
                self.handle_roll(new_contract.clone(), now);
            }
        }

        let Some(contract) = self.active.clone() else {
            return;
        };

        if let StreamView::Quote(quote) = stream {
            self.last_yes = Some(quote.clone());
        }

        let spot_up = matches!(spot, SpotView::Quote(_));
        let stream_up = matches!(stream, StreamView::Quote(_));
        self.gate.observe_feeds(spot_up, stream_up, now);
        let realized_total = self.lock_ledger().realized_total();
        self.gate.observe_realized(realized_total);

        let tte = contract.secs_to_expiry(now);

        let SpotView::Quote(spot_quote) = spot else {
            self.emit_skipped(&contract, None, tte, now, "skip_spot_unavailable");
            return;
        };

        let StreamView::Quote(yes_quote) = stream else {
            let decision = match stream {
                StreamView::Stale => "skip_stream_stale",
                _ => "skip_stream_disconnected",
            };
            self.emit_skipped(&contract, Some(spot_quote.price), tte, now, decision);
            return;
        };

        let model_prob = self
            .estimator
            .estimate(spot_quote.price, contract.strike, tte);
        let signal = self
            .edge
            .evaluate(self.spec.series, model_prob, yes_quote.price, now);

        let verdict = {
            let ledger = self.lock_ledger();
            self.gate
                .evaluate(&signal, ledger.position(self.spec.series), yes_quote.price, now)
        };

        self.audit.append(&AuditRecord::SeriesSnapshot {
            ts: now,
            series: self.spec.series,
            slug: contract.slug.clone(),
            spot: Some(spot_quote.price),
            strike: contract.strike,
            yes_price: Some(yes_quote.price),
            model_prob: Some(model_prob),
            edge_bps: Some(signal.edge_bps),
            direction: Some(signal.direction),
            tte_s: tte,
            decision: decision_label(&verdict).to_string(),
        });

        self.apply_verdict(verdict, &contract, &signal, yes_quote.price, now, started);
    }

    /// Rollover sequence: audit the roll, force-close any position still
    /// pinned to the retiring contract, then adopt the new one
    fn handle_roll(&mut self, new_contract: Contract, now: DateTime<Utc>) {
        let prev = self.active.take();
        let prev_slug = prev.as_ref().map(|c| c.slug.clone());

        tracing::info!(
            series = %self.spec.series,
            prev_slug = ?prev_slug,
            slug = %new_contract.slug,
            strike = %new_contract.strike,
            "Market roll"
        );

        self.audit.append(&AuditRecord::MarketRoll {
            ts: now,
            series: self.spec.series,
            prev_slug: prev_slug.clone(),
            slug: new_contract.slug.clone(),
            strike: new_contract.strike,
            expiry: new_contract.expiry,
        });

        if prev.is_some() {
            // Positions cannot outlive their contract; exit at the last
            // observed price, or flat at entry if we never saw a quote.
            let close = {
                let mut ledger = self.lock_ledger();
                match ledger.position(self.spec.series) {
                    Some(pos) => {
                        let price = self
                            .last_yes
                            .as_ref()
                            .map(|q| q.price)
                            .unwrap_or(pos.entry_price);
                        ledger.close(self.spec.series, price, now).ok()
                    }
                    None => None,
                }
            };
            if let Some(fill) = close {
                tracing::warn!(
                    series = %self.spec.series,
                    slug = %fill.slug,
                    realized_delta = %fill.realized_delta,
                    "Force-closed position on retiring contract"
                );
                self.append_submit(&fill, Some(CloseReason::Rollover));
            }
        }

        self.active = Some(new_contract);
        self.last_yes = None;
    }

    fn apply_verdict(
        &mut self,
        verdict: Verdict,
        contract: &Contract,
        signal: &Signal,
        yes_price: Decimal,
        now: DateTime<Utc>,
        started: Instant,
    ) {
        match verdict {
            Verdict::Open(side) => {
                let fill = self
                    .lock_ledger()
                    .open(self.spec.series, &contract.slug, side, yes_price, now);
                match fill {
                    Ok(fill) => {
                        self.gate.note_open(now);
                        self.append_submit(&fill, None);
                        self.metrics.record_submit(elapsed_ms(started));
                    }
                    Err(e) => {
                        tracing::error!(series = %self.spec.series, error = %e, "Open rejected by ledger");
                    }
                }
            }
            Verdict::ForceClose(reason) => {
                let fill = self.lock_ledger().close(self.spec.series, yes_price, now);
                match fill {
                    Ok(fill) => {
                        tracing::info!(
                            series = %self.spec.series,
                            reason = ?reason,
                            realized_delta = %fill.realized_delta,
                            "Forced close"
                        );
                        self.append_submit(&fill, Some(reason));
                    }
                    Err(e) => {
                        tracing::error!(series = %self.spec.series, error = %e, "Close rejected by ledger");
                    }
                }
            }
            Verdict::Flip(side) => {
                let fills =
                    self.lock_ledger()
                        .flip(self.spec.series, &contract.slug, side, yes_price, now);
                match fills {
                    Ok((close_fill, open_fill)) => {
                        self.gate.note_open(now);
                        self.append_submit(&close_fill, Some(CloseReason::Flip));
                        self.append_submit(&open_fill, None);
                        self.metrics.record_submit(elapsed_ms(started));
                    }
                    Err(e) => {
                        tracing::error!(series = %self.spec.series, error = %e, "Flip rejected by ledger");
                    }
                }
            }
            Verdict::Reject(reason) => {
                self.metrics.record_reject();
                tracing::info!(
                    series = %self.spec.series,
                    reason = ?reason,
                    direction = ?signal.direction,
                    edge_bps = %signal.edge_bps,
                    "Candidate rejected"
                );
            }
            Verdict::Hold | Verdict::NoAction => {}
        }
    }

    fn emit_skipped(
        &self,
        contract: &Contract,
        spot: Option<Decimal>,
        tte: f64,
        now: DateTime<Utc>,
        decision: &str,
    ) {
        self.audit.append(&AuditRecord::SeriesSnapshot {
            ts: now,
            series: self.spec.series,
            slug: contract.slug.clone(),
            spot,
            strike: contract.strike,
            yes_price: None,
            model_prob: None,
            edge_bps: None,
            direction: None,
            tte_s: tte,
            decision: decision.to_string(),
        });
    }

    fn append_submit(&self, fill: &Fill, close_reason: Option<CloseReason>) {
        self.audit.append(&AuditRecord::PaperSubmit {
            ts: fill.timestamp,
            series: fill.series,
            slug: fill.slug.clone(),
            intent_id: fill.intent_id,
            action: fill.action,
            side: fill.side,
            price: fill.price,
            size_usd: fill.size_usd,
            close_reason,
            realized_delta: fill.realized_delta,
            realized_total: fill.realized_total,
        });
    }

    fn lock_ledger(&self) -> MutexGuard<'_, PaperLedger> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn decision_label(verdict: &Verdict) -> &'static str {
    use crate::risk::{RejectReason, Verdict::*};
    match verdict {
        Open(side) => match side {
            crate::signal::Side::Yes => "open_buy_yes",
            crate::signal::Side::No => "open_buy_no",
        },
        ForceClose(CloseReason::StopLoss) => "force_close_stop_loss",
        ForceClose(CloseReason::TakeProfit) => "force_close_take_profit",
        ForceClose(_) => "force_close",
        Flip(side) => match side {
            crate::signal::Side::Yes => "flip_buy_yes",
            crate::signal::Side::No => "flip_buy_no",
        },
        Hold => "hold",
        Reject(RejectReason::KillSwitch) => "reject_kill_switch",
        Reject(RejectReason::MinHold) => "reject_min_hold",
        Reject(RejectReason::Cooldown) => "reject_cooldown",
        NoAction => "flat",
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Drive a pipeline on its own fixed-interval schedule
///
/// The loop gathers immutable snapshots from the source cells, runs the
/// tick, and pokes the resolver when the held contract has expired. It
/// never blocks on network I/O; a slow source degrades the tick to a skip.
pub fn spawn_pipeline(
    mut pipeline: SeriesPipeline,
    tick_interval: std::time::Duration,
    resolver: ResolverHandle,
    spot: ReferenceFeedHandle,
    stream: StreamHandle,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let started = Instant::now();
            let now = Utc::now();
            let resolved = resolver.contracts.borrow().clone();
            let spot_view = spot.latest(now);
            let stream_view = stream.latest(now);

            pipeline.process_tick(now, started, resolved.as_ref(), &spot_view, &stream_view);

            if pipeline.needs_resolution(Utc::now()) {
                let _ = resolver.poke.try_send(());
            }
        }

        tracing::info!(series = %pipeline.series(), "Pipeline stopped");
    })
}
