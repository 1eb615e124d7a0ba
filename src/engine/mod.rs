//! Engine wiring
//!
//! Builds the shared components, spawns the feed/resolver/stream/pipeline
//! tasks for both series, and runs until shutdown. The two series share only
//! the spot price cell, the kill switch, the ledger, and the audit sink.

mod pipeline;

pub use pipeline::{spawn_pipeline, SeriesPipeline};

use crate::config::Config;
use crate::execution::PaperLedger;
use crate::feed::{spawn_reference_feed, BinanceSpotClient};
use crate::market::{spawn_resolver, GammaClient, Series, SeriesResolver, SeriesSpec};
use crate::model::{build_estimator, Estimator};
use crate::risk::{GateParams, KillSwitch, RiskGate};
use crate::signal::EdgeEngine;
use crate::stream::{spawn_stream, StreamHandle, StreamTaskConfig, StreamView};
use crate::telemetry::{AlertThresholds, AuditLogger, AuditRecord, LoopMetrics};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Run the full paper-trading engine until ctrl-c
pub async fn run(config: Config) -> anyhow::Result<()> {
    let audit = Arc::new(AuditLogger::new(&config.telemetry.audit_dir)?);
    let metrics = Arc::new(LoopMetrics::new());
    let kill = Arc::new(KillSwitch::new());
    let ledger = Arc::new(Mutex::new(PaperLedger::new(config.execution.position_size_usd)));
    let estimator: Arc<dyn Estimator> = Arc::from(build_estimator(&config.model));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tracing::info!(
        symbol = %config.feed.symbol,
        edge_threshold_bps = %config.signal.edge_threshold_bps,
        audit_path = %audit.path().display(),
        "Starting paper trading engine"
    );

    let spot_client = BinanceSpotClient::new(&config.feed.rest_url, &config.feed.symbol);
    let spot = spawn_reference_feed(
        spot_client,
        Duration::from_millis(config.feed.poll_interval_ms),
        chrono::Duration::seconds(config.feed.unavailable_after_secs as i64),
        shutdown_rx.clone(),
    );

    let gamma = GammaClient::new(&config.market.gamma_api_url);

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut stream_handles: Vec<(Series, StreamHandle)> = Vec::new();

    for (series, series_cfg) in [
        (Series::FiveMin, &config.series.five_min),
        (Series::FifteenMin, &config.series.fifteen_min),
    ] {
        let spec = SeriesSpec {
            series,
            slug_prefix: series_cfg.slug_prefix.clone(),
            seed_slug: series_cfg.seed_slug.clone(),
            min_hold: chrono::Duration::seconds(series_cfg.min_hold_secs as i64),
        };

        let resolver = SeriesResolver::new(gamma.clone(), spec.clone());
        let resolver_handle = spawn_resolver(
            resolver,
            Duration::from_secs(config.market.refresh_interval_secs),
            shutdown_rx.clone(),
        );

        let stream_handle = spawn_stream(
            StreamTaskConfig::from_config(&config.stream),
            resolver_handle.contracts.clone(),
            shutdown_rx.clone(),
        );
        stream_handles.push((series, stream_handle.clone()));

        let gate = RiskGate::new(
            GateParams {
                stop_loss_usd: config.risk.stop_loss_usd,
                take_profit_usd: config.risk.take_profit_usd,
                max_cumulative_loss_usd: config.risk.max_cumulative_loss_usd,
                min_hold: spec.min_hold,
                cooldown: chrono::Duration::seconds(config.signal.cooldown_secs as i64),
                fatal_staleness: chrono::Duration::seconds(config.risk.fatal_staleness_secs as i64),
            },
            kill.clone(),
        );

        let series_pipeline = SeriesPipeline::new(
            spec,
            estimator.clone(),
            EdgeEngine::new(config.signal.edge_threshold_bps),
            gate,
            ledger.clone(),
            metrics.clone(),
            audit.clone(),
        );

        tasks.push(spawn_pipeline(
            series_pipeline,
            Duration::from_millis(config.app.loop_interval_ms),
            resolver_handle,
            spot.clone(),
            stream_handle,
            shutdown_rx.clone(),
        ));
    }

    tasks.push(spawn_telemetry(
        Duration::from_millis(config.app.loop_interval_ms),
        ledger.clone(),
        metrics.clone(),
        kill.clone(),
        audit.clone(),
        stream_handles,
        AlertThresholds {
            max_reject_rate: config.risk.max_reject_rate,
            min_decisions: config.risk.alert_min_decisions,
        },
        shutdown_rx.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping tasks");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        let _ = task.await;
    }

    tracing::info!(
        realized_total = %ledger.lock().map(|l| l.realized_total()).unwrap_or(Decimal::ZERO),
        "Engine stopped"
    );
    Ok(())
}

/// Periodic PnL/health summary on its own timer
///
/// Also evaluates the reject-spike alert and trips the kill switch on
/// breach.
#[allow(clippy::too_many_arguments)]
fn spawn_telemetry(
    interval: Duration,
    ledger: Arc<Mutex<PaperLedger>>,
    metrics: Arc<LoopMetrics>,
    kill: Arc<KillSwitch>,
    audit: Arc<AuditLogger>,
    streams: Vec<(Series, StreamHandle)>,
    alerts: AlertThresholds,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let now = Utc::now();
            let marks: HashMap<Series, Decimal> = streams
                .iter()
                .filter_map(|(series, handle)| match handle.latest(now) {
                    StreamView::Quote(q) => Some((*series, q.price)),
                    _ => None,
                })
                .collect();

            let (realized_total, unrealized_total, open_positions) = {
                let ledger = match ledger.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                (
                    ledger.realized_total(),
                    ledger.unrealized_total(&marks),
                    ledger.open_count(),
                )
            };

            let snapshot = metrics.snapshot();
            if alerts.reject_spike(&snapshot) {
                kill.activate("reject_spike");
            }

            audit.append(&AuditRecord::TelemetrySnapshot {
                ts: now,
                realized_total,
                unrealized_total,
                open_positions,
                loops: snapshot.loops,
                submits: snapshot.submits,
                rejects: snapshot.rejects,
                reject_rate: snapshot.reject_rate,
                p95_submit_ms: snapshot.submit_latency_ms.map(|s| s.p95),
                kill_switch: kill.is_active(),
            });
        }

        tracing::debug!("Telemetry task stopped");
    })
}
