//! Monitor configuration types.

use serde::{Deserialize, Serialize};

use crate::types::{MarketParameters, NetworkId, TokenInfo};

/// Close factor assumed when the market source does not report one.
pub const DEFAULT_CLOSE_FACTOR: f64 = 0.5;
/// Decimal places used when rendering an APY.
pub const DEFAULT_APY_PRECISION: usize = 2;
/// Minimum spacing between two non-forced fetches of the same market.
pub const DEFAULT_THROTTLE_SECS: u64 = 60;

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Active network.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Market-data API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Shared market cache bounds.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Fetch throttling and refresh cadence.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Liquidation sizing policy.
    #[serde(default)]
    pub risk: RiskConfig,

    /// Presentation settings.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Known networks and their token universes.
    #[serde(default = "default_networks")]
    pub networks: Vec<NetworkConfig>,
}

/// Market-data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the market-data service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Outgoing request budget.
    #[serde(default = "default_requests_per_sec")]
    pub requests_per_sec: u32,
}

/// Bounds for the shared TTL cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

/// Timing configuration (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Window during which a repeat load of the same market is skipped.
    #[serde(default = "default_throttle")]
    pub throttle_secs: u64,
    /// Background refresh interval.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

/// What to do when the market source omits the close factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingCloseFactor {
    /// Assume `default_close_factor` and flag the sizing as assumed.
    AssumeDefault,
    /// Refuse to size the liquidation.
    Reject,
}

/// Liquidation sizing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_close_factor")]
    pub default_close_factor: f64,
    #[serde(default = "default_missing_close_factor")]
    pub missing_close_factor: MissingCloseFactor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_apy_precision")]
    pub apy_precision: usize,
}

/// One network: its pool and the tokens listed in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub pool_id: String,
    #[serde(default)]
    pub tokens: Vec<TokenInfo>,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::new("mainnet")
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".into()
}
fn default_timeout() -> u64 {
    15
}
fn default_requests_per_sec() -> u32 {
    5
}

fn default_cache_ttl() -> u64 {
    30
}
fn default_cache_max_size() -> usize {
    100
}

fn default_throttle() -> u64 {
    DEFAULT_THROTTLE_SECS
}
fn default_refresh_interval() -> u64 {
    120
}

fn default_close_factor() -> f64 {
    DEFAULT_CLOSE_FACTOR
}
fn default_missing_close_factor() -> MissingCloseFactor {
    MissingCloseFactor::AssumeDefault
}

fn default_apy_precision() -> usize {
    DEFAULT_APY_PRECISION
}

fn default_networks() -> Vec<NetworkConfig> {
    vec![NetworkConfig {
        id: NetworkId::new("mainnet"),
        pool_id: "main".into(),
        tokens: vec![
            TokenInfo {
                symbol: "USDC".into(),
                decimals: 6,
                asset_id: "USDC".into(),
                fully_utilized: false,
                params: Some(MarketParameters {
                    base_borrow_rate_bps: 200,
                    slope_bps: 1000,
                    reserve_factor_bps: 1000,
                }),
            },
            TokenInfo {
                symbol: "WETH".into(),
                decimals: 18,
                asset_id: "WETH".into(),
                fully_utilized: false,
                params: None,
            },
            TokenInfo {
                symbol: "USDP".into(),
                decimals: 6,
                asset_id: "USDP".into(),
                fully_utilized: true,
                params: Some(MarketParameters {
                    base_borrow_rate_bps: 300,
                    slope_bps: 500,
                    reserve_factor_bps: 500,
                }),
            },
        ],
    }]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            requests_per_sec: default_requests_per_sec(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_size: default_cache_max_size(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            throttle_secs: default_throttle(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_close_factor: default_close_factor(),
            missing_close_factor: default_missing_close_factor(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            apy_precision: default_apy_precision(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            api: ApiConfig::default(),
            cache: CacheSettings::default(),
            fetch: FetchConfig::default(),
            risk: RiskConfig::default(),
            display: DisplayConfig::default(),
            networks: default_networks(),
        }
    }
}

impl MonitorConfig {
    /// The configuration block for the active network, if listed.
    pub fn active_network(&self) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.id == self.network)
    }
}
