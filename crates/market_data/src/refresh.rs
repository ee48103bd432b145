//! Periodic background refresh of every tracked market.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::orchestrator::{FetchOrchestrator, LoadOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Each tick goes through the throttle and the shared cache.
    Throttled,
    /// Each tick forces a fetch of every market not in flight.
    Forced,
}

/// Handle to a spawned refresh loop. Dropping it stops the loop.
pub struct RefreshTask {
    token: CancellationToken,
    _guard: DropGuard,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Start refreshing. The first tick fires immediately.
    pub fn spawn(orchestrator: Arc<FetchOrchestrator>, every: Duration, mode: RefreshMode) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Refreshing {} markets on {} every {:?} ({:?})",
                orchestrator.keys().len(),
                orchestrator.network_id(),
                every,
                mode
            );

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let outcomes = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    outcomes = run_tick(&orchestrator, mode) => outcomes,
                };

                let updated = outcomes
                    .iter()
                    .filter(|(_, o)| matches!(o, LoadOutcome::Fetched | LoadOutcome::CacheHit))
                    .count();
                let failed = outcomes
                    .iter()
                    .filter(|(_, o)| *o == LoadOutcome::Failed)
                    .count();
                debug!(
                    "Refresh tick: {} updated, {} failed, {} skipped",
                    updated,
                    failed,
                    outcomes.len() - updated - failed
                );
            }

            info!("Market refresh stopped");
        });

        Self {
            _guard: token.clone().drop_guard(),
            token,
            handle,
        }
    }

    /// Stop the loop. An in-progress tick is abandoned; its in-flight
    /// markets are released.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

async fn run_tick(
    orchestrator: &FetchOrchestrator,
    mode: RefreshMode,
) -> Vec<(common::MarketKey, LoadOutcome)> {
    match mode {
        RefreshMode::Throttled => orchestrator.load_all_markets().await,
        RefreshMode::Forced => orchestrator.refresh_all_markets().await,
    }
}
