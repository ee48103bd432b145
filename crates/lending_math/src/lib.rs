//! Interest-rate and liquidation-risk math.
//!
//! Pure functions only; nothing here touches the network or holds state.

pub mod rate;
pub mod risk;

pub use rate::{
    apy_from_reported_rates, borrow_rate, calculate_borrow_apy, calculate_deposit_apy,
    color_tier_for_apy, convert_rate_to_apy, format_apy, format_apy_with, supply_rate,
    utilization_rate, ApyCalculationResult, ApyFormat, ApyTier, ReportedApy,
};
pub use risk::{
    assess_account, gauge_percent, liquidation_sizing, risk_tier, sort_by_risk,
    try_liquidation_sizing, CloseFactorSource, LiquidationSizing, RiskSummary, SizingConfig,
};
