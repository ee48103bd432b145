//! Market data freshness: TTL cache, fetch orchestration, periodic refresh.
//!
//! The orchestrator owns per-market load state and guarantees at most one
//! in-flight fetch per market; the cache is an injected, process-wide store
//! shared by every orchestrator that needs it.

pub mod cache;
pub mod catalog;
pub mod fetcher;
pub mod orchestrator;
pub mod refresh;

pub use cache::{new_market_cache, CacheConfig, CacheEntry, SharedMarketCache, TtlCache};
pub use catalog::{ConfigTokenCatalog, TokenCatalog};
pub use fetcher::MarketInfoFetcher;
pub use orchestrator::{
    FetchOrchestrator, FetchState, LoadOutcome, OnDemandMarketData, OrchestratorConfig,
};
pub use refresh::{RefreshMode, RefreshTask};
