//! CLOB WebSocket subscription task
//!
//! One task per series. Driven by the resolver's contract cell: a slug
//! change tears down the current subscription (whatever its state) and
//! reconnects for the new token. Connection failures back off exponentially
//! with a capped delay and unlimited retries; this channel is never allowed
//! to permanently die for a live series.

use super::{StreamHandle, StreamSnapshot, StreamState, StreamTaskConfig, YesQuote};
use crate::market::Contract;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Subscription message for the CLOB market channel
#[derive(Debug, Serialize)]
struct SubscriptionMessage {
    assets_ids: Vec<String>,
    #[serde(rename = "type")]
    msg_type: String,
}

/// Why the per-contract connection ended
enum StreamExit {
    /// The resolver published a different contract
    Rollover,
    Shutdown,
    /// Connection error or clean close; reconnect with backoff
    Retry(String),
}

/// Spawn the subscription task for one series
pub fn spawn_stream(
    config: StreamTaskConfig,
    contracts: watch::Receiver<Option<Contract>>,
    shutdown: watch::Receiver<bool>,
) -> StreamHandle {
    let (tx, rx) = watch::channel(StreamSnapshot {
        state: StreamState::Disconnected,
        quote: None,
    });
    let stale_after = config.stale_after;

    tokio::spawn(run_stream(config, contracts, shutdown, tx));

    StreamHandle::new(rx, stale_after)
}

async fn run_stream(
    config: StreamTaskConfig,
    mut contracts: watch::Receiver<Option<Contract>>,
    mut shutdown: watch::Receiver<bool>,
    tx: watch::Sender<StreamSnapshot>,
) {
    loop {
        // Wait for an active contract
        let contract = loop {
            let current = contracts.borrow().clone();
            if let Some(c) = current {
                break c;
            }
            tokio::select! {
                changed = contracts.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        };

        tracing::info!(
            series = %contract.series,
            slug = %contract.slug,
            token_id = %contract.yes_token_id,
            "Subscribing to contract YES channel"
        );

        // Quote from a prior contract must not leak across rollover
        let _ = tx.send(StreamSnapshot {
            state: StreamState::Connecting,
            quote: None,
        });

        let mut backoff = config.initial_backoff;

        loop {
            match connect_and_stream(&config, &contract, &tx, &mut contracts, &mut shutdown).await {
                StreamExit::Rollover => {
                    tracing::info!(
                        series = %contract.series,
                        slug = %contract.slug,
                        "Rollover instruction, tearing down subscription"
                    );
                    break;
                }
                StreamExit::Shutdown => return,
                StreamExit::Retry(reason) => {
                    set_state(&tx, StreamState::Disconnected);
                    tracing::warn!(
                        series = %contract.series,
                        slug = %contract.slug,
                        reason = %reason,
                        backoff_ms = backoff.as_millis() as u64,
                        "Stream connection lost, reconnecting"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        changed = contracts.changed() => {
                            if changed.is_err() || rolled_over(&contracts, &contract) {
                                break;
                            }
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                    backoff = (backoff * 2).min(config.max_backoff);
                }
            }
        }
    }
}

fn rolled_over(contracts: &watch::Receiver<Option<Contract>>, current: &Contract) -> bool {
    contracts
        .borrow()
        .as_ref()
        .map(|c| c.slug != current.slug)
        .unwrap_or(false)
}

fn set_state(tx: &watch::Sender<StreamSnapshot>, state: StreamState) {
    let quote = tx.borrow().quote.clone();
    let _ = tx.send(StreamSnapshot { state, quote });
}

async fn connect_and_stream(
    config: &StreamTaskConfig,
    contract: &Contract,
    tx: &watch::Sender<StreamSnapshot>,
    contracts: &mut watch::Receiver<Option<Contract>>,
    shutdown: &mut watch::Receiver<bool>,
) -> StreamExit {
    set_state(tx, StreamState::Connecting);

    let (ws_stream, _) = match connect_async(&config.ws_url).await {
        Ok(ok) => ok,
        Err(e) => return StreamExit::Retry(e.to_string()),
    };
    let (mut write, mut read) = ws_stream.split();

    let sub = SubscriptionMessage {
        assets_ids: vec![contract.yes_token_id.clone()],
        msg_type: "market".to_string(),
    };
    let sub_json = match serde_json::to_string(&sub) {
        Ok(json) => json,
        Err(e) => return StreamExit::Retry(e.to_string()),
    };
    if let Err(e) = write.send(Message::Text(sub_json)).await {
        return StreamExit::Retry(e.to_string());
    }

    set_state(tx, StreamState::Subscribed);

    let stale_after = std::time::Duration::from_millis(
        config.stale_after.num_milliseconds().max(0) as u64,
    );
    let mut stale_deadline = tokio::time::Instant::now() + stale_after;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(price) = parse_yes_price(&text, &contract.yes_token_id) {
                            let _ = tx.send(StreamSnapshot {
                                state: StreamState::Subscribed,
                                quote: Some(YesQuote {
                                    price,
                                    observed_at: Utc::now(),
                                }),
                            });
                            stale_deadline = tokio::time::Instant::now() + stale_after;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return StreamExit::Retry(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        return StreamExit::Retry("close frame".into());
                    }
                    Some(Err(e)) => {
                        return StreamExit::Retry(e.to_string());
                    }
                    None => {
                        return StreamExit::Retry("stream ended".into());
                    }
                    _ => {}
                }
            }

            _ = tokio::time::sleep_until(stale_deadline) => {
                if tx.borrow().state != StreamState::Stale {
                    tracing::warn!(
                        series = %contract.series,
                        slug = %contract.slug,
                        "No stream update within stale timeout"
                    );
                    set_state(tx, StreamState::Stale);
                }
                stale_deadline += stale_after;
            }

            changed = contracts.changed() => {
                if changed.is_err() {
                    return StreamExit::Shutdown;
                }
                if rolled_over(contracts, contract) {
                    return StreamExit::Rollover;
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return StreamExit::Shutdown;
                }
            }
        }
    }
}

/// Extract a YES price for `token_id` from a raw CLOB message
///
/// The market channel mixes shapes: book snapshots, price_change events,
/// last_trade_price notices, plain and array-wrapped, some nesting updates
/// under `events`/`changes`. Walk them all and take the first price-bearing
/// field for our asset.
pub(crate) fn parse_yes_price(text: &str, token_id: &str) -> Option<Decimal> {
    let value: Value = serde_json::from_str(text).ok()?;
    walk_value(&value, token_id, None)
}

fn walk_value(value: &Value, token_id: &str, inherited_asset: Option<&str>) -> Option<Decimal> {
    match value {
        Value::Array(items) => items
            .iter()
            .find_map(|item| walk_value(item, token_id, inherited_asset)),
        Value::Object(map) => {
            let asset = map
                .get("asset_id")
                .or_else(|| map.get("asset"))
                .or_else(|| map.get("token_id"))
                .and_then(|v| v.as_str())
                .or(inherited_asset);

            if asset == Some(token_id) {
                if let Some(price) = extract_price(map) {
                    return Some(price);
                }
            }

            for key in ["events", "changes"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    if let Some(price) = items
                        .iter()
                        .find_map(|item| walk_value(item, token_id, asset))
                    {
                        return Some(price);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn extract_price(map: &serde_json::Map<String, Value>) -> Option<Decimal> {
    for key in ["price", "best_bid", "best_ask"] {
        let Some(raw) = map.get(key) else {
            continue;
        };
        let parsed = match raw {
            Value::String(s) => Decimal::from_str(s).ok(),
            Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
            _ => None,
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}
