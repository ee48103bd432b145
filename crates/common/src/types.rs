//! Domain types shared across the monitor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Identifiers ───────────────────────────────────────────────────────

/// Network identifier (e.g. "mainnet", "testnet").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

impl NetworkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NetworkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies one market: an asset inside a lending pool on a network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    pub network_id: NetworkId,
    pub pool_id: String,
    pub asset_id: String,
}

impl MarketKey {
    pub fn new(
        network_id: impl Into<NetworkId>,
        pool_id: impl Into<String>,
        asset_id: impl Into<String>,
    ) -> Self {
        Self {
            network_id: network_id.into(),
            pool_id: pool_id.into(),
            asset_id: asset_id.into(),
        }
    }

    /// Cache key in the `{domain}-{networkId}-{...discriminators}` convention.
    pub fn cache_key(&self) -> String {
        format!("market-{}-{}-{}", self.network_id, self.pool_id, self.asset_id)
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.network_id, self.pool_id, self.asset_id)
    }
}

// ── Rate model inputs ─────────────────────────────────────────────────

/// Interest curve parameters for one market, in basis points (1 bps = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketParameters {
    pub base_borrow_rate_bps: u32,
    pub slope_bps: u32,
    /// Protocol cut of interest, 0..=10000.
    pub reserve_factor_bps: u32,
}

/// Aggregate pool balances used to derive utilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub total_scaled_deposits: f64,
    pub total_scaled_borrows: f64,
    pub last_update_time: DateTime<Utc>,
}

/// A token the monitor knows about on some network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    /// Protocol-side asset identifier passed to the market-data source.
    pub asset_id: String,
    /// Pegged-token markets whose borrow side always behaves as 100% utilized.
    #[serde(default)]
    pub fully_utilized: bool,
    /// Curve parameters; when absent, the rates reported by the source are used.
    #[serde(default)]
    pub params: Option<MarketParameters>,
}

// ── Market data from the upstream source ──────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid decimal string: {:?}", s))),
        }
    }
}

fn de_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.into_f64()
}

fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(v) => v.into_f64().map(Some),
        None => Ok(None),
    }
}

/// Raw protocol fields for one market, as returned by the market-data source.
///
/// Numeric fields accept either JSON numbers or decimal strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    #[serde(default, deserialize_with = "de_decimal")]
    pub total_deposits: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub total_borrows: f64,
    /// Periodic supply rate as a fraction.
    #[serde(default, deserialize_with = "de_decimal")]
    pub supply_rate: f64,
    /// Periodic borrow rate as a fraction.
    #[serde(default, deserialize_with = "de_decimal")]
    pub borrow_rate_current: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub utilization_rate: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub collateral_factor: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub liquidation_threshold: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub liquidation_bonus: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub reserve_factor: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub max_total_deposits: f64,
    #[serde(default, deserialize_with = "de_decimal")]
    pub price: f64,
    /// Not every source reports a close factor.
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub close_factor: Option<f64>,
}

// ── Accounts ──────────────────────────────────────────────────────────

/// Liquidation risk tier derived from a health factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Liquidatable,
    Danger,
    Moderate,
    Safe,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Liquidatable => "liquidatable",
            RiskLevel::Danger => "danger",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Safe => "safe",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One collateral or debt position inside an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPosition {
    pub symbol: String,
    pub amount: f64,
    pub value_usd: f64,
}

/// A borrower account as shown on the liquidation dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationAccount {
    pub wallet_address: String,
    pub health_factor: f64,
    pub total_supplied: f64,
    pub total_borrowed: f64,
    /// Loan-to-value in [0, 1].
    pub ltv: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub collateral_assets: Vec<AssetPosition>,
    #[serde(default)]
    pub borrowed_assets: Vec<AssetPosition>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_info_accepts_strings_and_numbers() {
        let raw = r#"{
            "totalDeposits": "1000000.5",
            "totalBorrows": 500000,
            "supplyRate": "0.045",
            "borrowRateCurrent": 0.1,
            "utilizationRate": "0.5",
            "price": "1.0001",
            "closeFactor": "0.25"
        }"#;
        let info: MarketInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.total_deposits, 1_000_000.5);
        assert_eq!(info.total_borrows, 500_000.0);
        assert_eq!(info.supply_rate, 0.045);
        assert_eq!(info.borrow_rate_current, 0.1);
        assert_eq!(info.close_factor, Some(0.25));
        // Missing fields default to zero.
        assert_eq!(info.liquidation_bonus, 0.0);
    }

    #[test]
    fn test_market_info_close_factor_null_or_missing() {
        let info: MarketInfo = serde_json::from_str(r#"{"closeFactor": null}"#).unwrap();
        assert_eq!(info.close_factor, None);
        let info: MarketInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(info.close_factor, None);
    }

    #[test]
    fn test_market_info_rejects_garbage_string() {
        let result = serde_json::from_str::<MarketInfo>(r#"{"totalDeposits": "lots"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_market_key_cache_key_is_network_scoped() {
        let a = MarketKey::new("mainnet", "main-pool", "USDC");
        let b = MarketKey::new("testnet", "main-pool", "USDC");
        assert_eq!(a.cache_key(), "market-mainnet-main-pool-USDC");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.to_string(), "mainnet/main-pool/USDC");
    }

    #[test]
    fn test_risk_level_serde_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Liquidatable).unwrap();
        assert_eq!(json, "\"liquidatable\"");
    }
}
