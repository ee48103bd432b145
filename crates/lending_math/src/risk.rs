//! Liquidation risk: health-factor tiers, liquidation sizing, gauge mapping.

use chrono::{DateTime, Utc};
use common::config::{MissingCloseFactor, RiskConfig, DEFAULT_CLOSE_FACTOR};
use common::{AssetPosition, Error, LiquidationAccount, RiskLevel};
use serde::Serialize;
use tracing::{debug, warn};

/// Upper bounds (inclusive) of each tier.
pub const LIQUIDATABLE_MAX_HF: f64 = 1.0;
pub const DANGER_MAX_HF: f64 = 1.1;
pub const MODERATE_MAX_HF: f64 = 1.2;

const GAUGE_MIN_HF: f64 = 0.1;
const GAUGE_KNEE_HF: f64 = 0.8;
const GAUGE_MAX_HF: f64 = 3.0;
const GAUGE_MIN_PCT: f64 = 5.0;
const GAUGE_KNEE_PCT: f64 = 10.0;
const GAUGE_MAX_PCT: f64 = 92.0;

/// Tier for a health factor. Lower tier wins on a boundary.
///
/// NaN is treated as zero; `+∞` (no debt) is safe.
pub fn risk_tier(health_factor: f64) -> RiskLevel {
    let hf = if health_factor.is_nan() {
        warn!("risk_tier: NaN health factor, treating as 0");
        0.0
    } else {
        health_factor
    };

    if hf <= LIQUIDATABLE_MAX_HF {
        RiskLevel::Liquidatable
    } else if hf <= DANGER_MAX_HF {
        RiskLevel::Danger
    } else if hf <= MODERATE_MAX_HF {
        RiskLevel::Moderate
    } else {
        RiskLevel::Safe
    }
}

/// Map a health factor onto a 5..92 gauge.
///
/// Two linear segments: `[0.1, 0.8] → [5, 10]` and `(0.8, 3.0] → (10, 92]`.
/// Input is clamped to `[0.1, 3.0]` first.
pub fn gauge_percent(health_factor: f64) -> f64 {
    let hf = if health_factor.is_nan() {
        GAUGE_MIN_HF
    } else {
        health_factor.clamp(GAUGE_MIN_HF, GAUGE_MAX_HF)
    };

    if hf <= GAUGE_KNEE_HF {
        let t = (hf - GAUGE_MIN_HF) / (GAUGE_KNEE_HF - GAUGE_MIN_HF);
        GAUGE_MIN_PCT + t * (GAUGE_KNEE_PCT - GAUGE_MIN_PCT)
    } else {
        let t = (hf - GAUGE_KNEE_HF) / (GAUGE_MAX_HF - GAUGE_KNEE_HF);
        GAUGE_KNEE_PCT + t * (GAUGE_MAX_PCT - GAUGE_KNEE_PCT)
    }
}

// ── Liquidation sizing ────────────────────────────────────────────────

/// Where a sizing's close factor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseFactorSource {
    /// Reported by the market.
    Market,
    /// Not reported (or unusable); the configured default was applied.
    AssumedDefault,
}

/// Sizing policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingConfig {
    pub default_close_factor: f64,
    pub missing_close_factor: MissingCloseFactor,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            default_close_factor: DEFAULT_CLOSE_FACTOR,
            missing_close_factor: MissingCloseFactor::AssumeDefault,
        }
    }
}

impl From<&RiskConfig> for SizingConfig {
    fn from(cfg: &RiskConfig) -> Self {
        Self {
            default_close_factor: cfg.default_close_factor,
            missing_close_factor: cfg.missing_close_factor,
        }
    }
}

/// How much of a collateral position one liquidation call may seize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidationSizing {
    pub close_factor: f64,
    pub close_factor_source: CloseFactorSource,
    pub collateral_value_usd: f64,
    /// value_usd / amount; 0 when undefined.
    pub asset_price: f64,
    pub max_liquidatable_usd: f64,
    pub max_liquidatable_amount: f64,
    /// Set when `amount == 0` and no price can be derived. Amount and price
    /// are zero sentinels in that case; callers must check before display.
    pub division_undefined: bool,
}

fn valid_close_factor(cf: f64) -> bool {
    cf.is_finite() && cf > 0.0 && cf <= 1.0
}

fn resolve_close_factor(
    symbol: &str,
    close_factor: Option<f64>,
    config: &SizingConfig,
) -> (f64, CloseFactorSource) {
    let fallback = if valid_close_factor(config.default_close_factor) {
        config.default_close_factor
    } else {
        warn!(
            "invalid configured close factor {}, using {}",
            config.default_close_factor, DEFAULT_CLOSE_FACTOR
        );
        DEFAULT_CLOSE_FACTOR
    };

    match close_factor {
        Some(cf) if valid_close_factor(cf) => (cf, CloseFactorSource::Market),
        Some(cf) => {
            warn!("{}: close factor {} outside (0, 1], using {}", symbol, cf, fallback);
            (fallback, CloseFactorSource::AssumedDefault)
        }
        None => (fallback, CloseFactorSource::AssumedDefault),
    }
}

/// Size a liquidation against one collateral position.
///
/// Total: a missing close factor falls back to the configured default and
/// the result is flagged `AssumedDefault`.
pub fn liquidation_sizing(
    position: &AssetPosition,
    close_factor: Option<f64>,
    config: &SizingConfig,
) -> LiquidationSizing {
    let (close_factor, close_factor_source) =
        resolve_close_factor(&position.symbol, close_factor, config);

    let collateral_value_usd = if position.value_usd.is_finite() && position.value_usd >= 0.0 {
        position.value_usd
    } else {
        warn!("{}: invalid value_usd {}", position.symbol, position.value_usd);
        0.0
    };
    let max_liquidatable_usd = collateral_value_usd * close_factor;

    if !(position.amount.is_finite() && position.amount > 0.0) {
        debug!(
            "{}: amount {} gives no asset price; sizing undefined",
            position.symbol, position.amount
        );
        return LiquidationSizing {
            close_factor,
            close_factor_source,
            collateral_value_usd,
            asset_price: 0.0,
            max_liquidatable_usd,
            max_liquidatable_amount: 0.0,
            division_undefined: true,
        };
    }

    let asset_price = collateral_value_usd / position.amount;
    let max_liquidatable_amount = if asset_price > 0.0 {
        max_liquidatable_usd / asset_price
    } else {
        0.0
    };

    LiquidationSizing {
        close_factor,
        close_factor_source,
        collateral_value_usd,
        asset_price,
        max_liquidatable_usd,
        max_liquidatable_amount,
        division_undefined: false,
    }
}

/// Like `liquidation_sizing`, but honours `MissingCloseFactor::Reject`.
pub fn try_liquidation_sizing(
    position: &AssetPosition,
    close_factor: Option<f64>,
    config: &SizingConfig,
) -> Result<LiquidationSizing, Error> {
    if close_factor.is_none() && config.missing_close_factor == MissingCloseFactor::Reject {
        return Err(Error::MissingCloseFactor(position.symbol.clone()));
    }
    Ok(liquidation_sizing(position, close_factor, config))
}

// ── Accounts ──────────────────────────────────────────────────────────

/// Build an account view from its positions.
///
/// LTV is borrowed / supplied, clamped to [0, 1]; an account with nothing
/// supplied reports 1 if it owes anything and 0 otherwise.
pub fn assess_account(
    wallet_address: impl Into<String>,
    health_factor: f64,
    collateral_assets: Vec<AssetPosition>,
    borrowed_assets: Vec<AssetPosition>,
    last_updated: DateTime<Utc>,
) -> LiquidationAccount {
    let total_supplied: f64 = collateral_assets.iter().map(|p| p.value_usd).sum();
    let total_borrowed: f64 = borrowed_assets.iter().map(|p| p.value_usd).sum();

    let ltv = if total_supplied > 0.0 {
        (total_borrowed / total_supplied).clamp(0.0, 1.0)
    } else if total_borrowed > 0.0 {
        1.0
    } else {
        0.0
    };
    let ltv = if ltv.is_nan() { 0.0 } else { ltv };

    LiquidationAccount {
        wallet_address: wallet_address.into(),
        health_factor,
        total_supplied,
        total_borrowed,
        ltv,
        risk_level: risk_tier(health_factor),
        collateral_assets,
        borrowed_assets,
        last_updated,
    }
}

/// Order accounts most urgent first (ascending health factor).
pub fn sort_by_risk(accounts: &mut [LiquidationAccount]) {
    // NaN ranks with zero, matching `risk_tier`.
    let key = |hf: f64| if hf.is_nan() { 0.0 } else { hf };
    accounts.sort_by(|a, b| key(a.health_factor).total_cmp(&key(b.health_factor)));
}

/// Per-tier counts across a set of accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskSummary {
    pub liquidatable: usize,
    pub danger: usize,
    pub moderate: usize,
    pub safe: usize,
    /// Debt held by liquidatable and danger accounts.
    pub at_risk_debt_usd: f64,
}

impl RiskSummary {
    /// Tiers are recomputed from each account's health factor rather than
    /// trusting a stored `risk_level`.
    pub fn from_accounts(accounts: &[LiquidationAccount]) -> Self {
        let mut summary = Self::default();
        for account in accounts {
            match risk_tier(account.health_factor) {
                RiskLevel::Liquidatable => {
                    summary.liquidatable += 1;
                    summary.at_risk_debt_usd += account.total_borrowed;
                }
                RiskLevel::Danger => {
                    summary.danger += 1;
                    summary.at_risk_debt_usd += account.total_borrowed;
                }
                RiskLevel::Moderate => summary.moderate += 1,
                RiskLevel::Safe => summary.safe += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.liquidatable + self.danger + self.moderate + self.safe
    }
}
