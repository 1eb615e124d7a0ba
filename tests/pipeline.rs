//! End-to-end pipeline scenarios driven through synthetic source snapshots

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use strike_edge::config::ModelConfig;
use strike_edge::engine::SeriesPipeline;
use strike_edge::execution::PaperLedger;
use strike_edge::feed::{SpotQuote, SpotView};
use strike_edge::market::{Contract, Series, SeriesSpec};
use strike_edge::model::build_estimator;
use strike_edge::risk::{GateParams, KillSwitch, RiskGate};
use strike_edge::signal::{EdgeEngine, Side};
use strike_edge::stream::{StreamView, YesQuote};
use strike_edge::telemetry::{AuditLogger, LoopMetrics};

struct Harness {
    pipeline: SeriesPipeline,
    ledger: Arc<Mutex<PaperLedger>>,
    audit: Arc<AuditLogger>,
    kill: Arc<KillSwitch>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(AuditLogger::new(dir.path()).unwrap());
    let ledger = Arc::new(Mutex::new(PaperLedger::new(dec!(25))));
    let kill = Arc::new(KillSwitch::new());

    let spec = SeriesSpec {
        series: Series::FiveMin,
        slug_prefix: "btc-updown-5m".to_string(),
        seed_slug: "btc-updown-5m-100".to_string(),
        min_hold: Duration::seconds(45),
    };
    let gate = RiskGate::new(
        GateParams {
            stop_loss_usd: dec!(12),
            take_profit_usd: dec!(18),
            max_cumulative_loss_usd: dec!(100),
            min_hold: Duration::seconds(45),
            cooldown: Duration::seconds(0),
            fatal_staleness: Duration::seconds(30),
        },
        kill.clone(),
    );

    let pipeline = SeriesPipeline::new(
        spec,
        Arc::from(build_estimator(&ModelConfig::default())),
        EdgeEngine::new(dec!(800)),
        gate,
        ledger.clone(),
        Arc::new(LoopMetrics::new()),
        audit.clone(),
    );

    Harness {
        pipeline,
        ledger,
        audit,
        kill,
        _dir: dir,
    }
}

fn contract(slug: &str, strike: Decimal, now: DateTime<Utc>) -> Contract {
    Contract {
        series: Series::FiveMin,
        slug: slug.to_string(),
        condition_id: "0xabc".to_string(),
        question: format!("Will BTC be above ${strike}?"),
        strike,
        expiry: now + Duration::minutes(5),
        yes_token_id: "yes-token".to_string(),
        no_token_id: "no-token".to_string(),
    }
}

fn spot(price: Decimal, now: DateTime<Utc>) -> SpotView {
    SpotView::Quote(SpotQuote {
        price,
        observed_at: now,
    })
}

fn yes(price: Decimal, now: DateTime<Utc>) -> StreamView {
    StreamView::Quote(YesQuote {
        price,
        observed_at: now,
    })
}

fn records(audit: &AuditLogger) -> Vec<Value> {
    std::fs::read_to_string(audit.path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn kinds(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["kind"].as_str().unwrap().to_string())
        .collect()
}

/// Spec worked example: spot 67000, strike 66900, market YES 0.50 produces
/// edge above threshold, an approved open, and the two audit records.
#[test]
fn worked_example_opens_buy_yes() {
    let mut h = harness();
    let now = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), now);

    h.pipeline.process_tick(
        now,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), now),
        &yes(dec!(0.50), now),
    );

    let recs = records(&h.audit);
    assert_eq!(kinds(&recs), ["market_roll", "series_snapshot", "paper_submit"]);

    let snapshot = &recs[1];
    assert_eq!(snapshot["decision"], "open_buy_yes");
    let edge: f64 = snapshot["edge_bps"].as_str().map(|s| s.parse().unwrap()).unwrap_or_else(|| snapshot["edge_bps"].as_f64().unwrap());
    assert!(edge >= 800.0, "edge {edge} should clear the threshold");

    let submit = &recs[2];
    assert_eq!(submit["action"], "open");
    assert_eq!(submit["side"], "yes");

    let ledger = h.ledger.lock().unwrap();
    assert_eq!(ledger.open_count(), 1);
    assert_eq!(ledger.position(Series::FiveMin).unwrap().side, Side::Yes);
}

/// At most one open position per series across repeated strong signals.
#[test]
fn one_position_invariant_under_repeated_signals() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    for i in 0..10 {
        let now = start + Duration::seconds(i);
        h.pipeline.process_tick(
            now,
            Instant::now(),
            Some(&c),
            &spot(dec!(67000), now),
            &yes(dec!(0.50), now),
        );
        assert!(h.ledger.lock().unwrap().open_count() <= 1);
    }

    // Re-entry in the same direction holds instead of stacking
    assert_eq!(h.ledger.lock().unwrap().open_count(), 1);
    let opens = records(&h.audit)
        .iter()
        .filter(|r| r["kind"] == "paper_submit" && r["action"] == "open")
        .count();
    assert_eq!(opens, 1);
}

/// A stop-loss breach closes on the very next tick, even though the
/// candidate signal still points the same way.
#[test]
fn stop_loss_forces_close_next_tick() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    h.pipeline.process_tick(
        start,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), start),
        &yes(dec!(0.50), start),
    );
    assert_eq!(h.ledger.lock().unwrap().open_count(), 1);

    // qty = 25 / 0.50 = 50; at 0.26 the unrealized loss is exactly -12
    let next = start + Duration::seconds(1);
    h.pipeline.process_tick(
        next,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), next),
        &yes(dec!(0.26), next),
    );

    let recs = records(&h.audit);
    let last_submit = recs
        .iter()
        .rev()
        .find(|r| r["kind"] == "paper_submit")
        .unwrap();
    assert_eq!(last_submit["action"], "close");
    assert_eq!(last_submit["close_reason"], "stop_loss");
    assert_eq!(h.ledger.lock().unwrap().open_count(), 0);
    assert_eq!(h.ledger.lock().unwrap().realized_total(), dec!(-12.00));
}

/// Take-profit closes the same way on a gain.
#[test]
fn take_profit_forces_close() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    h.pipeline.process_tick(
        start,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), start),
        &yes(dec!(0.50), start),
    );

    // qty 50; at 0.90 the unrealized gain is +20 >= 18
    let next = start + Duration::seconds(1);
    h.pipeline.process_tick(
        next,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), next),
        &yes(dec!(0.90), next),
    );

    let recs = records(&h.audit);
    let last_submit = recs
        .iter()
        .rev()
        .find(|r| r["kind"] == "paper_submit")
        .unwrap();
    assert_eq!(last_submit["close_reason"], "take_profit");
    assert_eq!(h.ledger.lock().unwrap().realized_total(), dec!(20.00));
}

/// Flip sequencing: opposite signal after min-hold produces a close record
/// immediately followed by an open record within the same tick.
#[test]
fn flip_emits_close_then_open_same_tick() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    h.pipeline.process_tick(
        start,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), start),
        &yes(dec!(0.50), start),
    );

    // Past min-hold (45s); spot below strike turns the model bearish while
    // the market still quotes 0.50, so the candidate is BuyNo.
    let later = start + Duration::seconds(60);
    h.pipeline.process_tick(
        later,
        Instant::now(),
        Some(&c),
        &spot(dec!(66800), later),
        &yes(dec!(0.50), later),
    );

    let recs = records(&h.audit);
    let submits: Vec<&Value> = recs.iter().filter(|r| r["kind"] == "paper_submit").collect();
    assert_eq!(submits.len(), 3); // first open, flip close, flip open

    let flip_close = submits[1];
    let flip_open = submits[2];
    assert_eq!(flip_close["action"], "close");
    assert_eq!(flip_close["close_reason"], "flip");
    assert_eq!(flip_close["side"], "yes");
    assert_eq!(flip_open["action"], "open");
    assert_eq!(flip_open["side"], "no");
    // No flat gap observable between the legs
    assert_eq!(flip_close["ts"], flip_open["ts"]);

    let ledger = h.ledger.lock().unwrap();
    assert_eq!(ledger.open_count(), 1);
    assert_eq!(ledger.position(Series::FiveMin).unwrap().side, Side::No);
}

/// An opposite signal before min-hold is rejected and logged, position kept.
#[test]
fn flip_rejected_under_min_hold() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    h.pipeline.process_tick(
        start,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), start),
        &yes(dec!(0.50), start),
    );

    let early = start + Duration::seconds(10);
    h.pipeline.process_tick(
        early,
        Instant::now(),
        Some(&c),
        &spot(dec!(66800), early),
        &yes(dec!(0.50), early),
    );

    let recs = records(&h.audit);
    let last_snapshot = recs
        .iter()
        .rev()
        .find(|r| r["kind"] == "series_snapshot")
        .unwrap();
    assert_eq!(last_snapshot["decision"], "reject_min_hold");

    let ledger = h.ledger.lock().unwrap();
    assert_eq!(ledger.position(Series::FiveMin).unwrap().side, Side::Yes);
}

/// Kill switch: opens are rejected with no paper_submit record, while a
/// breached stop-loss on an already-open position still closes.
#[test]
fn kill_switch_blocks_opens_but_not_stop_loss() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    // Open before the kill switch trips
    h.pipeline.process_tick(
        start,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), start),
        &yes(dec!(0.50), start),
    );
    assert_eq!(h.ledger.lock().unwrap().open_count(), 1);

    h.kill.activate("operator");

    // Stop-loss breach still closes under an active kill switch
    let next = start + Duration::seconds(1);
    h.pipeline.process_tick(
        next,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), next),
        &yes(dec!(0.20), next),
    );
    assert_eq!(h.ledger.lock().unwrap().open_count(), 0);

    // New strong candidate is rejected; no further open record appears
    let after = start + Duration::seconds(2);
    h.pipeline.process_tick(
        after,
        Instant::now(),
        Some(&c),
        &spot(dec!(67000), after),
        &yes(dec!(0.50), after),
    );

    let recs = records(&h.audit);
    let last_snapshot = recs
        .iter()
        .rev()
        .find(|r| r["kind"] == "series_snapshot")
        .unwrap();
    assert_eq!(last_snapshot["decision"], "reject_kill_switch");

    let opens = recs
        .iter()
        .filter(|r| r["kind"] == "paper_submit" && r["action"] == "open")
        .count();
    assert_eq!(opens, 1);
    assert_eq!(h.ledger.lock().unwrap().open_count(), 0);
}

/// Rollover with an open position: exactly one market_roll record and one
/// forced close before anything happens on the new contract.
#[test]
fn rollover_audit_ordering() {
    let mut h = harness();
    let start = Utc::now();
    let first = contract("btc-updown-5m-100", dec!(66900), start);

    h.pipeline.process_tick(
        start,
        Instant::now(),
        Some(&first),
        &spot(dec!(67000), start),
        &yes(dec!(0.50), start),
    );

    let second = contract("btc-updown-5m-400", dec!(67100), start);
    let later = start + Duration::seconds(10);
    h.pipeline.process_tick(
        later,
        Instant::now(),
        Some(&second),
        &spot(dec!(67200), later),
        &yes(dec!(0.50), later),
    );

    let recs = records(&h.audit);
    let all_kinds = kinds(&recs);
    // Tick 2: roll, forced close, then the snapshot/actions for the new slug
    let roll_idx = all_kinds.iter().rposition(|k| k == "market_roll").unwrap();
    assert_eq!(recs[roll_idx]["prev_slug"], "btc-updown-5m-100");

    let forced = &recs[roll_idx + 1];
    assert_eq!(forced["kind"], "paper_submit");
    assert_eq!(forced["close_reason"], "rollover");
    assert_eq!(forced["slug"], "btc-updown-5m-100");

    // Everything after the forced close refers to the new contract only
    for rec in &recs[roll_idx + 2..] {
        assert_eq!(rec["slug"], "btc-updown-5m-400");
    }

    let rolls = all_kinds.iter().filter(|k| *k == "market_roll").count();
    assert_eq!(rolls, 2); // initial discovery + the rollover
}

/// Cumulative realized loss across ticks trips the kill switch.
#[test]
fn cumulative_loss_trips_kill_switch() {
    let mut h = harness();
    let start = Utc::now();
    let c = contract("btc-updown-5m-100", dec!(66900), start);

    // Repeated open -> stop-loss cycles; each realizes -12 USD. The gate
    // observes cumulative realized PnL at the top of the following tick.
    let mut now = start;
    for _ in 0..12 {
        h.pipeline.process_tick(
            now,
            Instant::now(),
            Some(&c),
            &spot(dec!(67000), now),
            &yes(dec!(0.50), now),
        );
        now += Duration::seconds(1);
        h.pipeline.process_tick(
            now,
            Instant::now(),
            Some(&c),
            &spot(dec!(67000), now),
            &yes(dec!(0.26), now),
        );
        now += Duration::seconds(1);
        if h.kill.is_active() {
            break;
        }
    }

    assert!(h.kill.is_active());
    assert_eq!(h.kill.check().reason, "cumulative_loss_breach");
}
