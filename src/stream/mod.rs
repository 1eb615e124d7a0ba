//! Contract YES-price stream module
//!
//! Maintains one persistent WebSocket subscription per series to the active
//! contract's YES token channel. Quotes land in a single-slot latest-wins
//! cell; intermediate updates may be dropped, only the most recent matters
//! for the fixed-cadence evaluation loop.

mod clob;

pub use clob::spawn_stream;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;

/// Connection state of the subscription task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Subscribed,
    /// Subscribed but no update within the stale timeout
    Stale,
}

/// A YES-price observation for the active contract
#[derive(Debug, Clone, PartialEq)]
pub struct YesQuote {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl YesQuote {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.observed_at
    }
}

/// What the evaluation loop sees each tick
///
/// `Stale` and `Disconnected` mean "no tradeable signal this tick"; a stale
/// price is never silently reused.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamView {
    Quote(YesQuote),
    Stale,
    Disconnected,
}

/// Latest-wins snapshot published by the subscription task
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    pub state: StreamState,
    pub quote: Option<YesQuote>,
}

impl StreamSnapshot {
    fn disconnected() -> Self {
        Self {
            state: StreamState::Disconnected,
            quote: None,
        }
    }
}

/// Runtime configuration for one subscription task
#[derive(Debug, Clone)]
pub struct StreamTaskConfig {
    pub ws_url: String,
    pub initial_backoff: std::time::Duration,
    pub max_backoff: std::time::Duration,
    pub stale_after: Duration,
}

impl StreamTaskConfig {
    pub fn from_config(cfg: &crate::config::StreamConfig) -> Self {
        Self {
            ws_url: cfg.ws_url.clone(),
            initial_backoff: std::time::Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: std::time::Duration::from_millis(cfg.max_backoff_ms),
            stale_after: Duration::seconds(cfg.stale_after_secs as i64),
        }
    }
}

/// Read side of a subscription task
#[derive(Clone)]
pub struct StreamHandle {
    rx: watch::Receiver<StreamSnapshot>,
    stale_after: Duration,
}

impl StreamHandle {
    pub(crate) fn new(rx: watch::Receiver<StreamSnapshot>, stale_after: Duration) -> Self {
        Self { rx, stale_after }
    }

    /// Latest quote as of `now`
    pub fn latest(&self, now: DateTime<Utc>) -> StreamView {
        let snapshot = self.rx.borrow().clone();
        match snapshot.state {
            StreamState::Disconnected | StreamState::Connecting => StreamView::Disconnected,
            StreamState::Subscribed | StreamState::Stale => match snapshot.quote {
                Some(quote) if quote.age(now) <= self.stale_after => StreamView::Quote(quote),
                _ => StreamView::Stale,
            },
        }
    }

    pub fn state(&self) -> StreamState {
        self.rx.borrow().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn handle_with(snapshot: StreamSnapshot) -> StreamHandle {
        let (tx, rx) = watch::channel(snapshot);
        std::mem::forget(tx);
        StreamHandle::new(rx, Duration::seconds(10))
    }

    #[test]
    fn test_latest_disconnected() {
        let handle = handle_with(StreamSnapshot::disconnected());
        assert_eq!(handle.latest(Utc::now()), StreamView::Disconnected);
    }

    #[test]
    fn test_latest_connecting_is_disconnected() {
        let handle = handle_with(StreamSnapshot {
            state: StreamState::Connecting,
            quote: None,
        });
        assert_eq!(handle.latest(Utc::now()), StreamView::Disconnected);
    }

    #[test]
    fn test_latest_fresh_quote() {
        let now = Utc::now();
        let handle = handle_with(StreamSnapshot {
            state: StreamState::Subscribed,
            quote: Some(YesQuote {
                price: dec!(0.52),
                observed_at: now,
            }),
        });

        match handle.latest(now) {
            StreamView::Quote(q) => assert_eq!(q.price, dec!(0.52)),
            other => panic!("expected quote, got {other:?}"),
        }
    }

    #[test]
    fn test_latest_aged_quote_is_stale() {
        let now = Utc::now();
        let handle = handle_with(StreamSnapshot {
            state: StreamState::Subscribed,
            quote: Some(YesQuote {
                price: dec!(0.52),
                observed_at: now - Duration::seconds(30),
            }),
        });
        assert_eq!(handle.latest(now), StreamView::Stale);
    }

    #[test]
    fn test_latest_subscribed_without_quote_is_stale() {
        let handle = handle_with(StreamSnapshot {
            state: StreamState::Subscribed,
            quote: None,
        });
        assert_eq!(handle.latest(Utc::now()), StreamView::Stale);
    }

    #[test]
    fn test_stream_task_config_from_config() {
        let cfg = crate::config::StreamConfig::default();
        let task_cfg = StreamTaskConfig::from_config(&cfg);
        assert_eq!(task_cfg.initial_backoff, std::time::Duration::from_secs(1));
        assert_eq!(task_cfg.max_backoff, std::time::Duration::from_secs(30));
        assert_eq!(task_cfg.stale_after, Duration::seconds(10));
    }
}
