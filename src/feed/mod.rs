//! Reference price feed module
//!
//! Polls the spot price on a fixed interval and exposes the latest quote
//! plus staleness through a single-slot watch cell shared by both series.

mod binance;

pub use binance::BinanceSpotClient;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A spot price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotQuote {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl SpotQuote {
    /// Age of this quote at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.observed_at
    }
}

/// What the evaluation loop sees each tick
#[derive(Debug, Clone, PartialEq)]
pub enum SpotView {
    /// Latest quote, possibly carrying staleness from transient fetch failures
    Quote(SpotQuote),
    /// No quote within the configured bound; skip the series this tick
    Unavailable,
}

/// Trait for spot price sources
#[async_trait]
pub trait SpotSource: Send + Sync {
    /// Fetch the current spot price
    async fn fetch(&self) -> anyhow::Result<SpotQuote>;
}

/// Read side of the reference feed
#[derive(Clone)]
pub struct ReferenceFeedHandle {
    rx: watch::Receiver<Option<SpotQuote>>,
    unavailable_after: Duration,
}

impl ReferenceFeedHandle {
    /// Latest quote as of `now`, degraded to `Unavailable` past the bound
    pub fn latest(&self, now: DateTime<Utc>) -> SpotView {
        match self.rx.borrow().as_ref() {
            Some(quote) if quote.age(now) <= self.unavailable_after => {
                SpotView::Quote(quote.clone())
            }
            _ => SpotView::Unavailable,
        }
    }
}

/// Spawn the polling loop for a spot source
///
/// Transient fetch failures leave the last quote in place; its growing age
/// is what eventually degrades the view to `Unavailable`.
pub fn spawn_reference_feed<S: SpotSource + 'static>(
    source: S,
    poll_interval: std::time::Duration,
    unavailable_after: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> ReferenceFeedHandle {
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

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

            match source.fetch().await {
                Ok(quote) => {
                    let _ = tx.send(Some(quote));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Spot fetch failed, keeping last quote");
                }
            }
        }

        tracing::debug!("Reference feed task stopped");
    });

    ReferenceFeedHandle {
        rx,
        unavailable_after,
    }
}
