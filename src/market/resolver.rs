//! Per-series contract resolution with rollover detection
//!
//! A resolver task per series refreshes the active contract on a fixed
//! interval (and on demand when the pipeline reports an expired contract)
//! and publishes it into a latest-wins watch cell. The evaluation pipeline
//! detects rollover by comparing slugs against its held contract.

use super::{Contract, GammaClient, MarketError, SeriesSpec};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Resolves the active contract for one series
pub struct SeriesResolver {
    client: GammaClient,
    spec: SeriesSpec,
}

impl SeriesResolver {
    pub fn new(client: GammaClient, spec: SeriesSpec) -> Self {
        Self { client, spec }
    }

    pub fn spec(&self) -> &SeriesSpec {
        &self.spec
    }

    /// Resolve the contract whose window contains `now`
    ///
    /// Prefix-matched candidates are preferred; when upstream lags and none
    /// matches, the configured seed slug is tried before giving up until the
    /// next refresh.
    pub async fn resolve(&self, now: DateTime<Utc>) -> Result<Contract, MarketError> {
        let candidates = self.client.fetch_by_prefix(&self.spec.slug_prefix).await?;

        let mut current: Vec<_> = candidates
            .into_iter()
            .filter(|m| m.window_contains(now))
            .collect();
        // Contiguous windows never overlap; if upstream briefly lists two,
        // the earliest-ending one is the live window.
        current.sort_by_key(|m| m.end_ts());

        if let Some(market) = current.into_iter().next() {
            return market.into_contract(self.spec.series);
        }

        tracing::debug!(
            series = %self.spec.series,
            seed_slug = %self.spec.seed_slug,
            "No prefix match contains now, falling back to seed slug"
        );

        match self.client.fetch_by_slug(&self.spec.seed_slug).await? {
            Some(market) => market.into_contract(self.spec.series),
            None => Err(MarketError::NoActiveContract(self.spec.slug_prefix.clone())),
        }
    }
}

/// Handle to a spawned resolver task
pub struct ResolverHandle {
    /// Latest resolved contract; None until the first successful resolve
    pub contracts: watch::Receiver<Option<Contract>>,
    /// On-demand re-resolution trigger (used when a contract expires mid-cycle)
    pub poke: mpsc::Sender<()>,
}

/// Spawn the refresh loop for one series
pub fn spawn_resolver(
    resolver: SeriesResolver,
    refresh_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> ResolverHandle {
    let (tx, rx) = watch::channel(None);
    let (poke_tx, mut poke_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                poke = poke_rx.recv() => {
                    if poke.is_none() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match resolver.resolve(Utc::now()).await {
                Ok(contract) => {
                    let changed = tx
                        .borrow()
                        .as_ref()
                        .map(|prev: &Contract| prev.slug != contract.slug)
                        .unwrap_or(true);
                    if changed {
                        tracing::info!(
                            series = %contract.series,
                            slug = %contract.slug,
                            strike = %contract.strike,
                            expiry = %contract.expiry,
                            "Resolved active contract"
                        );
                        let _ = tx.send(Some(contract));
                    }
                }
                Err(MarketError::MetadataIncomplete(detail)) => {
                    // Skip this series until the next refresh; not fatal
                    tracing::warn!(
                        series = %resolver.spec.series,
                        detail = %detail,
                        "Contract metadata incomplete, skipping refresh"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        series = %resolver.spec.series,
                        error = %e,
                        "Market refresh failed, retrying next interval"
                    );
                }
            }
        }

        tracing::debug!(series = %resolver.spec.series, "Resolver task stopped");
    });

    ResolverHandle {
        contracts: rx,
        poke: poke_tx,
    }
}
