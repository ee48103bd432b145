//! Interest-rate model: utilization → borrow/supply rate → APY.
//!
//! The curve is a single linear segment: `base + slope · utilization`,
//! with no kink. Supply side earns `borrow · utilization · (1 − reserve)`.
//!
//! APY compounds a **daily** rate 365 times:
//!
//! `apy = ((1 + r/365)^365 − 1) · 100`
//!
//! This is not simple APR. At 10% the difference is ~0.5 percentage points,
//! at 100% it is ~72 points, so displayed yields at high rates are
//! materially larger than the raw rate.
//!
//! Every function is total: malformed input (NaN, infinities, negative
//! balances) produces a zeroed value and a `warn!` instead of a panic.

use common::config::DEFAULT_APY_PRECISION;
use common::{MarketParameters, MarketState};
use serde::Serialize;
use tracing::warn;

pub const BPS_DENOM: f64 = 10_000.0;
/// Compounding periods per year for `convert_rate_to_apy`.
pub const COMPOUNDING_PERIODS: i32 = 365;

/// Below this (but above zero) an APY renders as `<0.01%`.
const APY_FLOOR: f64 = 0.01;
/// Above this an APY renders as `>1000%`.
const APY_CEILING: f64 = 1000.0;

/// Yield breakdown for one side of a market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApyCalculationResult {
    /// borrows / deposits. May exceed 1 for an over-borrowed market.
    pub utilization_rate: f64,
    pub borrow_rate: f64,
    pub supply_rate: f64,
    /// Compounded yield, in percent.
    pub apy: f64,
    pub apy_formatted: String,
}

impl ApyCalculationResult {
    pub fn zeroed() -> Self {
        Self {
            utilization_rate: 0.0,
            borrow_rate: 0.0,
            supply_rate: 0.0,
            apy: 0.0,
            apy_formatted: format_apy(0.0),
        }
    }

    fn is_finite(&self) -> bool {
        self.utilization_rate.is_finite()
            && self.borrow_rate.is_finite()
            && self.supply_rate.is_finite()
            && self.apy.is_finite()
    }
}

/// borrows / deposits; 0 when nothing is deposited.
///
/// Not clamped: a value above 1 reflects a real protocol anomaly and is
/// passed through.
pub fn utilization_rate(deposits: f64, borrows: f64) -> f64 {
    if !deposits.is_finite() || !borrows.is_finite() || deposits < 0.0 || borrows < 0.0 {
        warn!(
            "utilization_rate: invalid balances deposits={} borrows={}",
            deposits, borrows
        );
        return 0.0;
    }
    if deposits == 0.0 {
        return 0.0;
    }
    borrows / deposits
}

/// `base_bps/10000 + slope_bps/10000 · utilization`.
pub fn borrow_rate(base_bps: u32, slope_bps: u32, utilization: f64) -> f64 {
    if !utilization.is_finite() || utilization < 0.0 {
        warn!("borrow_rate: invalid utilization {}", utilization);
        return 0.0;
    }
    let base = base_bps as f64 / BPS_DENOM;
    let slope = slope_bps as f64 / BPS_DENOM;
    base + slope * utilization
}

/// `borrow_rate · utilization · (1 − reserve_factor_bps/10000)`, never above
/// `borrow_rate`. Over-borrowed markets (utilization > 1) are capped.
pub fn supply_rate(borrow_rate: f64, utilization: f64, reserve_factor_bps: u32) -> f64 {
    if !borrow_rate.is_finite() || !utilization.is_finite() || borrow_rate < 0.0 || utilization < 0.0
    {
        warn!(
            "supply_rate: invalid input borrow_rate={} utilization={}",
            borrow_rate, utilization
        );
        return 0.0;
    }
    let reserve_factor_bps = if reserve_factor_bps as f64 > BPS_DENOM {
        warn!(
            "supply_rate: reserve factor {} bps above 10000, capping",
            reserve_factor_bps
        );
        BPS_DENOM
    } else {
        reserve_factor_bps as f64
    };
    let supply = borrow_rate * utilization * (1.0 - reserve_factor_bps / BPS_DENOM);
    if supply > borrow_rate {
        warn!(
            "supply_rate: supply rate {} above borrow rate {} (utilization {})",
            supply, borrow_rate, utilization
        );
        return borrow_rate;
    }
    supply
}

/// Compound a daily rate over 365 periods; result in percent.
pub fn convert_rate_to_apy(periodic_rate: f64) -> f64 {
    if !periodic_rate.is_finite() || periodic_rate < 0.0 {
        warn!("convert_rate_to_apy: invalid rate {}", periodic_rate);
        return 0.0;
    }
    let periods = COMPOUNDING_PERIODS as f64;
    let apy = ((1.0 + periodic_rate / periods).powi(COMPOUNDING_PERIODS) - 1.0) * 100.0;
    if !apy.is_finite() {
        warn!("convert_rate_to_apy: overflow for rate {}", periodic_rate);
        return f64::MAX;
    }
    apy
}

/// Supplier-side yield for a market.
pub fn calculate_deposit_apy(params: &MarketParameters, state: &MarketState) -> ApyCalculationResult {
    let utilization = utilization_rate(state.total_scaled_deposits, state.total_scaled_borrows);
    let borrow = borrow_rate(params.base_borrow_rate_bps, params.slope_bps, utilization);
    let supply = supply_rate(borrow, utilization, params.reserve_factor_bps);
    let apy = convert_rate_to_apy(supply);

    let result = ApyCalculationResult {
        utilization_rate: utilization,
        borrow_rate: borrow,
        supply_rate: supply,
        apy,
        apy_formatted: format_apy(apy),
    };
    if result.is_finite() {
        result
    } else {
        warn!("calculate_deposit_apy: non-finite result, returning zero");
        ApyCalculationResult::zeroed()
    }
}

/// Borrower-side cost for a market.
///
/// `is_fully_utilized` pins utilization to 1.0, for pegged-token markets
/// whose borrow side always behaves as fully utilized. `supply_rate` is not
/// meaningful here and is reported as 0.
pub fn calculate_borrow_apy(
    params: &MarketParameters,
    state: &MarketState,
    is_fully_utilized: bool,
) -> ApyCalculationResult {
    let utilization = if is_fully_utilized {
        1.0
    } else {
        utilization_rate(state.total_scaled_deposits, state.total_scaled_borrows)
    };
    let borrow = borrow_rate(params.base_borrow_rate_bps, params.slope_bps, utilization);
    let apy = convert_rate_to_apy(borrow);

    let result = ApyCalculationResult {
        utilization_rate: utilization,
        borrow_rate: borrow,
        supply_rate: 0.0,
        apy,
        apy_formatted: format_apy(apy),
    };
    if result.is_finite() {
        result
    } else {
        warn!("calculate_borrow_apy: non-finite result, returning zero");
        ApyCalculationResult::zeroed()
    }
}

/// Deposit and borrow yields built from rates a market source reports directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportedApy {
    pub deposit: ApyCalculationResult,
    pub borrow: ApyCalculationResult,
}

/// Build yields from source-reported periodic rates.
///
/// A supply rate above the borrow rate, or a non-zero supply rate on an
/// idle market, is an upstream inconsistency; it is corrected and logged.
pub fn apy_from_reported_rates(utilization: f64, borrow_rate: f64, supply_rate: f64) -> ReportedApy {
    let sanitize = |name: &str, v: f64| {
        if v.is_finite() && v >= 0.0 {
            v
        } else {
            warn!("apy_from_reported_rates: invalid {} {}", name, v);
            0.0
        }
    };
    let utilization = sanitize("utilization", utilization);
    let borrow = sanitize("borrow_rate", borrow_rate);
    let mut supply = sanitize("supply_rate", supply_rate);

    if utilization == 0.0 && supply > 0.0 {
        warn!("apy_from_reported_rates: supply rate {} on idle market", supply);
        supply = 0.0;
    }
    if supply > borrow {
        warn!(
            "apy_from_reported_rates: supply rate {} above borrow rate {}",
            supply, borrow
        );
        supply = borrow;
    }

    let deposit_apy = convert_rate_to_apy(supply);
    let borrow_apy = convert_rate_to_apy(borrow);

    ReportedApy {
        deposit: ApyCalculationResult {
            utilization_rate: utilization,
            borrow_rate: borrow,
            supply_rate: supply,
            apy: deposit_apy,
            apy_formatted: format_apy(deposit_apy),
        },
        borrow: ApyCalculationResult {
            utilization_rate: utilization,
            borrow_rate: borrow,
            supply_rate: 0.0,
            apy: borrow_apy,
            apy_formatted: format_apy(borrow_apy),
        },
    }
}

// ── Presentation helpers ──────────────────────────────────────────────

/// APY rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApyFormat {
    /// Decimal places.
    pub precision: usize,
}

impl Default for ApyFormat {
    fn default() -> Self {
        Self {
            precision: DEFAULT_APY_PRECISION,
        }
    }
}

impl ApyFormat {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    pub fn format(&self, apy: f64) -> String {
        format_apy_with(apy, self.precision)
    }
}

/// Render an APY with the default precision.
pub fn format_apy(apy: f64) -> String {
    ApyFormat::default().format(apy)
}

/// Render an APY: `<0.01%` for tiny positive values, `>1000%` above 1000,
/// fixed-point with `precision` decimals otherwise.
pub fn format_apy_with(apy: f64, precision: usize) -> String {
    if apy.is_nan() || apy <= 0.0 {
        return format!("{:.*}%", precision, 0.0);
    }
    if apy < APY_FLOOR {
        return "<0.01%".to_string();
    }
    if apy > APY_CEILING {
        return ">1000%".to_string();
    }
    format!("{:.*}%", precision, apy)
}

/// Styling tier for an APY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApyTier {
    High,
    Medium,
    Low,
    Minimal,
}

impl ApyTier {
    pub fn label(&self) -> &'static str {
        match self {
            ApyTier::High => "high",
            ApyTier::Medium => "medium",
            ApyTier::Low => "low",
            ApyTier::Minimal => "minimal",
        }
    }
}

/// `≥10 high`, `≥5 medium`, `≥2 low`, else minimal.
pub fn color_tier_for_apy(apy: f64) -> ApyTier {
    if apy >= 10.0 {
        ApyTier::High
    } else if apy >= 5.0 {
        ApyTier::Medium
    } else if apy >= 2.0 {
        ApyTier::Low
    } else {
        ApyTier::Minimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state(deposits: f64, borrows: f64) -> MarketState {
        MarketState {
            total_scaled_deposits: deposits,
            total_scaled_borrows: borrows,
            last_update_time: Utc::now(),
        }
    }

    fn params(base: u32, slope: u32, reserve: u32) -> MarketParameters {
        MarketParameters {
            base_borrow_rate_bps: base,
            slope_bps: slope,
            reserve_factor_bps: reserve,
        }
    }

    #[test]
    fn test_end_to_end_deposit_apy() {
        let result = calculate_deposit_apy(&params(500, 1000, 1000), &state(1_000_000.0, 500_000.0));

        assert!((result.utilization_rate - 0.5).abs() < 1e-12);
        assert!((result.borrow_rate - 0.10).abs() < 1e-12);
        assert!((result.supply_rate - 0.045).abs() < 1e-12);
        // Daily compounding of 4.5% / 365 over 365 periods.
        assert!((result.apy - 4.6025).abs() < 0.001, "apy={}", result.apy);
        assert_eq!(result.apy_formatted, "4.60%");
    }

    #[test]
    fn test_utilization_zero_deposits() {
        assert_eq!(utilization_rate(0.0, 0.0), 0.0);
        assert_eq!(utilization_rate(0.0, 1234.0), 0.0);
    }

    #[test]
    fn test_utilization_not_clamped() {
        assert!((utilization_rate(100.0, 150.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_utilization_invalid_input_is_zero() {
        assert_eq!(utilization_rate(f64::NAN, 10.0), 0.0);
        assert_eq!(utilization_rate(100.0, -5.0), 0.0);
        assert_eq!(utilization_rate(f64::INFINITY, 5.0), 0.0);
    }

    #[test]
    fn test_supply_never_exceeds_borrow() {
        for reserve in [0u32, 1000, 5000, 10_000] {
            for step in 0..=20 {
                let u = step as f64 / 20.0;
                let b = borrow_rate(500, 2000, u);
                let s = supply_rate(b, u, reserve);
                assert!(s <= b, "u={} reserve={} supply={} borrow={}", u, reserve, s, b);
            }
        }
    }

    #[test]
    fn test_over_borrowed_market_supply_capped_at_borrow() {
        let params = MarketParameters {
            base_borrow_rate_bps: 500,
            slope_bps: 1000,
            reserve_factor_bps: 0,
        };
        let state = MarketState {
            total_scaled_deposits: 100.0,
            total_scaled_borrows: 150.0,
            last_update_time: chrono::Utc::now(),
        };
        let result = calculate_deposit_apy(&params, &state);
        assert_eq!(result.utilization_rate, 1.5);
        assert!((result.borrow_rate - 0.2).abs() < 1e-12);
        assert!(result.supply_rate <= result.borrow_rate);
        assert_eq!(result.supply_rate, result.borrow_rate);

        for u in [1.0, 1.25, 2.0, 10.0] {
            let b = borrow_rate(500, 2000, u);
            assert!(supply_rate(b, u, 0) <= b, "u={}", u);
        }
    }

    #[test]
    fn test_extreme_rate_renders_above_ceiling() {
        let apy = convert_rate_to_apy(1e6);
        assert!(apy.is_finite());
        assert_eq!(format_apy(apy), ">1000%");
        assert_eq!(color_tier_for_apy(apy), ApyTier::High);
    }

    #[test]
    fn test_supply_rate_reserve_factor_capped() {
        assert_eq!(supply_rate(0.1, 0.5, 20_000), 0.0);
    }

    #[test]
    fn test_convert_rate_to_apy() {
        assert_eq!(convert_rate_to_apy(0.0), 0.0);
        // Compounded yield is above the simple rate.
        assert!(convert_rate_to_apy(0.10) > 10.0);
        assert_eq!(convert_rate_to_apy(f64::NAN), 0.0);
        assert_eq!(convert_rate_to_apy(-0.5), 0.0);
    }

    #[test]
    fn test_idle_market_yields_nothing() {
        let result = calculate_deposit_apy(&params(500, 1000, 1000), &state(1_000.0, 0.0));
        assert_eq!(result.utilization_rate, 0.0);
        assert_eq!(result.supply_rate, 0.0);
        assert_eq!(result.apy, 0.0);
    }

    #[test]
    fn test_borrow_apy_fully_utilized() {
        let p = params(500, 1000, 1000);
        let normal = calculate_borrow_apy(&p, &state(1_000_000.0, 500_000.0), false);
        let pegged = calculate_borrow_apy(&p, &state(1_000_000.0, 500_000.0), true);

        assert!((normal.borrow_rate - 0.10).abs() < 1e-12);
        assert_eq!(pegged.utilization_rate, 1.0);
        assert!((pegged.borrow_rate - 0.15).abs() < 1e-12);
        assert_eq!(pegged.supply_rate, 0.0);
        assert!(pegged.apy > normal.apy);
    }

    #[test]
    fn test_deposit_apy_nan_state_is_zeroed() {
        let result = calculate_deposit_apy(&params(500, 1000, 1000), &state(f64::NAN, 10.0));
        assert_eq!(result.apy, 0.0);
        assert_eq!(result.apy_formatted, "0.00%");
    }

    #[test]
    fn test_reported_rates_are_corrected() {
        let reported = apy_from_reported_rates(0.5, 0.05, 0.08);
        assert_eq!(reported.deposit.supply_rate, 0.05);
        assert_eq!(reported.borrow.supply_rate, 0.0);

        let idle = apy_from_reported_rates(0.0, 0.02, 0.01);
        assert_eq!(idle.deposit.apy, 0.0);
        assert!(idle.borrow.apy > 0.0);
    }

    #[test]
    fn test_format_apy() {
        assert_eq!(format_apy(0.005), "<0.01%");
        assert_eq!(format_apy(1500.0), ">1000%");
        assert_eq!(format_apy(5.25), "5.25%");
        assert_eq!(format_apy(0.0), "0.00%");
        assert_eq!(format_apy(f64::NAN), "0.00%");
        assert_eq!(format_apy(1000.0), "1000.00%");
        assert_eq!(format_apy_with(4.60281, 3), "4.603%");
        assert_eq!(ApyFormat::new(1).format(12.34), "12.3%");
    }

    #[test]
    fn test_color_tiers() {
        assert_eq!(color_tier_for_apy(10.0), ApyTier::High);
        assert_eq!(color_tier_for_apy(9.99), ApyTier::Medium);
        assert_eq!(color_tier_for_apy(5.0), ApyTier::Medium);
        assert_eq!(color_tier_for_apy(2.0), ApyTier::Low);
        assert_eq!(color_tier_for_apy(1.99), ApyTier::Minimal);
        assert_eq!(color_tier_for_apy(f64::NAN), ApyTier::Minimal);
    }
}
