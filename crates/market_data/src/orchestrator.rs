//! On-demand market loading with per-market throttling.
//!
//! Each market moves `Uninitialized → Loading → Loaded(ok | error)`. A load
//! is skipped when the market is already in flight, or when it was fetched
//! inside the throttle window and the caller did not force a refresh.
//! Failures are throttled exactly like successes, so a broken market is not
//! re-requested on every render.
//!
//! All state-map and in-flight mutations happen between suspension points;
//! the only `.await`s are the cache lock and the fetcher call, and no map
//! guard is held across either.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::config::{FetchConfig, DEFAULT_THROTTLE_SECS};
use common::{Error, MarketInfo, MarketKey, MarketState, NetworkId, TokenInfo};
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use lending_math::{
    apy_from_reported_rates, calculate_borrow_apy, calculate_deposit_apy, utilization_rate,
    ApyCalculationResult,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::SharedMarketCache;
use crate::catalog::TokenCatalog;
use crate::fetcher::MarketInfoFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Minimum spacing between two non-forced fetches of one market.
    pub throttle: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_secs(DEFAULT_THROTTLE_SECS),
        }
    }
}

impl From<&FetchConfig> for OrchestratorConfig {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            throttle: Duration::from_secs(cfg.throttle_secs),
        }
    }
}

/// Raw market fields plus the yields derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnDemandMarketData {
    pub key: MarketKey,
    pub symbol: String,
    pub decimals: u8,
    pub info: MarketInfo,
    pub utilization_rate: f64,
    pub deposit: ApyCalculationResult,
    pub borrow: ApyCalculationResult,
    /// As reported; `None` when the source omits it.
    pub close_factor: Option<f64>,
}

impl OnDemandMarketData {
    /// Derive yields for one market.
    ///
    /// Tokens with configured curve parameters go through the rate model;
    /// the rest use the periodic rates the source reports.
    pub fn derive(
        key: MarketKey,
        token: &TokenInfo,
        info: MarketInfo,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let utilization = utilization_rate(info.total_deposits, info.total_borrows);

        let (deposit, borrow) = match token.params {
            Some(params) => {
                let state = MarketState {
                    total_scaled_deposits: info.total_deposits,
                    total_scaled_borrows: info.total_borrows,
                    last_update_time: fetched_at,
                };
                (
                    calculate_deposit_apy(&params, &state),
                    calculate_borrow_apy(&params, &state, token.fully_utilized),
                )
            }
            None => {
                let reported =
                    apy_from_reported_rates(utilization, info.borrow_rate_current, info.supply_rate);
                (reported.deposit, reported.borrow)
            }
        };

        Self {
            key,
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            close_factor: info.close_factor,
            info,
            utilization_rate: utilization,
            deposit,
            borrow,
        }
    }
}

/// Load state for one market.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub is_loading: bool,
    pub is_loaded: bool,
    /// Monotonic time of the last completed attempt, success or failure.
    pub last_fetched: Option<Instant>,
    /// Wall-clock time of the last completed attempt, for display.
    pub fetched_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Last good data. Kept across later failures.
    pub data: Option<OnDemandMarketData>,
}

/// What a single `load_market_data` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Key is not in this orchestrator's universe.
    UnknownMarket,
    /// Another load of the same key is running.
    InFlight,
    /// Fetched inside the throttle window; nothing done.
    Throttled,
    /// Served from the shared cache without calling the fetcher.
    CacheHit,
    Fetched,
    /// Fetcher failed or had no data; recorded in `FetchState::error`.
    Failed,
}

/// Removes the key from the in-flight set however the load ends,
/// including when the load future is dropped mid-fetch.
struct InFlightGuard<'a> {
    in_flight: &'a DashSet<MarketKey>,
    states: &'a DashMap<MarketKey, FetchState>,
    key: MarketKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.states.get_mut(&self.key) {
            state.is_loading = false;
        }
        self.in_flight.remove(&self.key);
    }
}

/// Coordinates loading of a fixed set of markets on one network.
pub struct FetchOrchestrator {
    network_id: NetworkId,
    config: OrchestratorConfig,
    fetcher: Arc<dyn MarketInfoFetcher>,
    cache: SharedMarketCache,
    /// Catalog order, for stable iteration.
    keys: Vec<MarketKey>,
    tokens: HashMap<MarketKey, TokenInfo>,
    states: DashMap<MarketKey, FetchState>,
    in_flight: DashSet<MarketKey>,
}

impl FetchOrchestrator {
    /// Seed one `FetchState` per catalog market on `network_id`.
    pub fn new(
        network_id: NetworkId,
        catalog: &dyn TokenCatalog,
        fetcher: Arc<dyn MarketInfoFetcher>,
        cache: SharedMarketCache,
        config: OrchestratorConfig,
    ) -> Self {
        let markets = catalog.market_keys(&network_id);
        if markets.is_empty() {
            warn!("No markets listed for network {}", network_id);
        }

        let mut keys = Vec::with_capacity(markets.len());
        let mut tokens = HashMap::with_capacity(markets.len());
        let states = DashMap::with_capacity(markets.len());
        for (key, token) in markets {
            states.insert(key.clone(), FetchState::default());
            tokens.insert(key.clone(), token);
            keys.push(key);
        }

        info!(
            "Tracking {} markets on {} (throttle {:?})",
            keys.len(),
            network_id,
            config.throttle
        );

        Self {
            network_id,
            config,
            fetcher,
            cache,
            keys,
            tokens,
            states,
            in_flight: DashSet::new(),
        }
    }

    pub fn network_id(&self) -> &NetworkId {
        &self.network_id
    }

    /// Every tracked market, in catalog order.
    pub fn keys(&self) -> &[MarketKey] {
        &self.keys
    }

    pub fn token(&self, key: &MarketKey) -> Option<&TokenInfo> {
        self.tokens.get(key)
    }

    pub fn is_in_flight(&self, key: &MarketKey) -> bool {
        self.in_flight.contains(key)
    }

    fn is_loaded(&self, key: &MarketKey) -> bool {
        self.states.get(key).is_some_and(|s| s.is_loaded)
    }

    pub fn state(&self, key: &MarketKey) -> Option<FetchState> {
        self.states.get(key).map(|s| s.clone())
    }

    pub fn market_data(&self, key: &MarketKey) -> Option<OnDemandMarketData> {
        self.states.get(key).and_then(|s| s.data.clone())
    }

    /// Every market's state, in catalog order.
    pub fn snapshot(&self) -> Vec<(MarketKey, FetchState)> {
        self.keys
            .iter()
            .filter_map(|k| self.state(k).map(|s| (k.clone(), s)))
            .collect()
    }

    /// Load one market unless it is in flight or throttled.
    ///
    /// `bypass_throttle` skips the throttle window and the shared cache; it
    /// never overrides the one-fetch-per-key rule.
    pub async fn load_market_data(&self, key: &MarketKey, bypass_throttle: bool) -> LoadOutcome {
        let Some(token) = self.tokens.get(key) else {
            warn!("{}", Error::MarketNotFound(key.to_string()));
            return LoadOutcome::UnknownMarket;
        };

        if self.in_flight.contains(key) {
            debug!("{}: already in flight", key);
            return LoadOutcome::InFlight;
        }

        if !bypass_throttle {
            let last_fetched = self.states.get(key).and_then(|s| s.last_fetched);
            if let Some(last) = last_fetched {
                let elapsed = last.elapsed();
                if elapsed < self.config.throttle {
                    debug!("{}: throttled ({}s since last fetch)", key, elapsed.as_secs());
                    return LoadOutcome::Throttled;
                }
            }
        }

        // Claim the key; `insert` is false if someone else already holds it.
        if !self.in_flight.insert(key.clone()) {
            return LoadOutcome::InFlight;
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            states: &self.states,
            key: key.clone(),
        };
        if let Some(mut state) = self.states.get_mut(key) {
            state.is_loading = true;
        }

        let cache_key = key.cache_key();
        if !bypass_throttle {
            let cached = self
                .cache
                .lock()
                .await
                .get_entry(&cache_key)
                .map(|e| (e.data.clone(), e.timestamp));
            if let Some((info, stored_at)) = cached {
                debug!("{}: served from shared cache", key);
                self.store_success(key, token, info, stored_at);
                return LoadOutcome::CacheHit;
            }
        }

        match self
            .fetcher
            .fetch(&key.pool_id, &key.asset_id, &key.network_id)
            .await
        {
            Ok(Some(info)) => {
                self.cache
                    .lock()
                    .await
                    .set(cache_key, info.clone(), key.network_id.clone());
                self.store_success(key, token, info, Instant::now());
                info!("{}: market data loaded", key);
                LoadOutcome::Fetched
            }
            Ok(None) => {
                let err = Error::NoData(key.to_string());
                warn!("{}", err);
                self.store_failure(key, err.to_string());
                LoadOutcome::Failed
            }
            Err(e) => {
                warn!("{}: fetch failed: {}", key, e);
                self.store_failure(key, e.to_string());
                LoadOutcome::Failed
            }
        }
    }

    /// Forced reload for explicit user refreshes.
    pub async fn load_market_data_with_bypass(&self, key: &MarketKey) -> LoadOutcome {
        self.load_market_data(key, true).await
    }

    /// Load markets as they scroll into view.
    ///
    /// Only keys never loaded and not in flight are touched; an already
    /// loaded key is left alone even when stale.
    pub async fn load_visible_markets(&self, keys: &[MarketKey]) -> Vec<(MarketKey, LoadOutcome)> {
        let pending: Vec<&MarketKey> = keys
            .iter()
            .filter(|k| !self.is_loaded(k) && !self.is_in_flight(k))
            .collect();
        if pending.is_empty() {
            return Vec::new();
        }
        debug!("Loading {} newly visible markets", pending.len());

        join_all(pending.into_iter().map(|k| async move {
            (k.clone(), self.load_market_data(k, false).await)
        }))
        .await
    }

    /// Load every market not in flight; each one re-checks its throttle.
    pub async fn load_all_markets(&self) -> Vec<(MarketKey, LoadOutcome)> {
        self.load_all(false).await
    }

    /// Force-reload every market not in flight.
    pub async fn refresh_all_markets(&self) -> Vec<(MarketKey, LoadOutcome)> {
        self.load_all(true).await
    }

    async fn load_all(&self, bypass_throttle: bool) -> Vec<(MarketKey, LoadOutcome)> {
        let pending: Vec<&MarketKey> = self
            .keys
            .iter()
            .filter(|k| !self.is_in_flight(k))
            .collect();

        join_all(pending.into_iter().map(|k| async move {
            (k.clone(), self.load_market_data(k, bypass_throttle).await)
        }))
        .await
    }

    fn store_success(&self, key: &MarketKey, token: &TokenInfo, info: MarketInfo, fetched: Instant) {
        // Cache hits report when the entry was stored, not now.
        let age = chrono::Duration::from_std(fetched.elapsed()).unwrap_or(chrono::Duration::zero());
        let fetched_at = Utc::now() - age;
        let data = OnDemandMarketData::derive(key.clone(), token, info, fetched_at);

        if let Some(mut state) = self.states.get_mut(key) {
            state.is_loading = false;
            state.is_loaded = true;
            state.error = None;
            state.last_fetched = Some(fetched);
            state.fetched_at = Some(fetched_at);
            state.data = Some(data);
        }
    }

    fn store_failure(&self, key: &MarketKey, message: String) {
        if let Some(mut state) = self.states.get_mut(key) {
            state.is_loading = false;
            state.is_loaded = true;
            state.error = Some(message);
            state.last_fetched = Some(Instant::now());
            state.fetched_at = Some(Utc::now());
        }
    }
}
