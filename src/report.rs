//! Plain-text rendering of market and account views.

use std::collections::HashMap;
use std::fmt::Write;

use common::{LiquidationAccount, MarketKey};
use lending_math::{
    color_tier_for_apy, format_apy_with, gauge_percent, try_liquidation_sizing, CloseFactorSource,
    RiskSummary, SizingConfig,
};
use market_data::FetchState;
use tracing::warn;

/// One row per market: symbol, utilization, deposit and borrow APY, status.
pub fn render_market_table(markets: &[(MarketKey, FetchState)], precision: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:>8} {:>12} {:>9} {:>12}  {}",
        "ASSET", "UTIL", "DEPOSIT APY", "TIER", "BORROW APY", "STATUS"
    );

    for (key, state) in markets {
        let status = match (&state.error, state.is_loading, state.is_loaded) {
            (Some(err), _, _) => format!("error: {}", err),
            (None, true, _) => "loading".to_string(),
            (None, false, false) => "not loaded".to_string(),
            (None, false, true) => state
                .fetched_at
                .map(|t| format!("ok @ {}", t.format("%H:%M:%S")))
                .unwrap_or_else(|| "ok".to_string()),
        };

        match &state.data {
            Some(data) => {
                let _ = writeln!(
                    out,
                    "{:<10} {:>7.2}% {:>12} {:>9} {:>12}  {}",
                    data.symbol,
                    data.utilization_rate * 100.0,
                    format_apy_with(data.deposit.apy, precision),
                    color_tier_for_apy(data.deposit.apy).label(),
                    format_apy_with(data.borrow.apy, precision),
                    status
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "{:<10} {:>8} {:>12} {:>9} {:>12}  {}",
                    key.asset_id, "-", "-", "-", "-", status
                );
            }
        }
    }
    out
}

/// Accounts most urgent first, with per-collateral liquidation sizing.
///
/// `close_factors` maps a collateral symbol to its market's reported close
/// factor. Accounts must already be sorted.
pub fn render_risk_report(
    accounts: &[LiquidationAccount],
    close_factors: &HashMap<String, Option<f64>>,
    sizing: &SizingConfig,
) -> String {
    let summary = RiskSummary::from_accounts(accounts);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} accounts: {} liquidatable, {} danger, {} moderate, {} safe (at-risk debt ${:.2})",
        summary.total(),
        summary.liquidatable,
        summary.danger,
        summary.moderate,
        summary.safe,
        summary.at_risk_debt_usd
    );

    for account in accounts {
        let _ = writeln!(
            out,
            "{}  hf={:.3} gauge={:.0}% risk={} ltv={:.1}% supplied=${:.2} borrowed=${:.2}",
            account.wallet_address,
            account.health_factor,
            gauge_percent(account.health_factor),
            account.risk_level,
            account.ltv * 100.0,
            account.total_supplied,
            account.total_borrowed
        );

        for position in &account.collateral_assets {
            let close_factor = close_factors.get(&position.symbol).copied().flatten();
            let sized = match try_liquidation_sizing(position, close_factor, sizing) {
                Ok(s) => s,
                Err(e) => {
                    warn!("{}: {}", account.wallet_address, e);
                    let _ = writeln!(out, "    {:<8} not sized: {}", position.symbol, e);
                    continue;
                }
            };

            if sized.division_undefined {
                let _ = writeln!(
                    out,
                    "    {:<8} max ${:.2} (amount unknown)",
                    position.symbol, sized.max_liquidatable_usd
                );
                continue;
            }
            let assumed = match sized.close_factor_source {
                CloseFactorSource::Market => "",
                CloseFactorSource::AssumedDefault => " (assumed)",
            };
            let _ = writeln!(
                out,
                "    {:<8} max ${:.2} = {:.4} units at cf {:.2}{}",
                position.symbol,
                sized.max_liquidatable_usd,
                sized.max_liquidatable_amount,
                sized.close_factor,
                assumed
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::config::MissingCloseFactor;
    use common::AssetPosition;
    use lending_math::{assess_account, sort_by_risk};

    fn position(symbol: &str, amount: f64, value_usd: f64) -> AssetPosition {
        AssetPosition {
            symbol: symbol.into(),
            amount,
            value_usd,
        }
    }

    fn accounts() -> Vec<LiquidationAccount> {
        let mut accounts = vec![
            assess_account(
                "0xsafe",
                2.5,
                vec![position("WETH", 1.0, 3000.0)],
                vec![position("USDC", 1000.0, 1000.0)],
                Utc::now(),
            ),
            assess_account(
                "0xunder",
                0.95,
                vec![position("WETH", 10.0, 1000.0)],
                vec![position("USDC", 900.0, 900.0)],
                Utc::now(),
            ),
        ];
        sort_by_risk(&mut accounts);
        accounts
    }

    #[test]
    fn test_unloaded_markets_render_placeholders() {
        let rows = vec![(MarketKey::new("mainnet", "main", "USDC"), FetchState::default())];
        let table = render_market_table(&rows, 2);
        assert!(table.lines().next().unwrap().starts_with("ASSET"));
        assert!(table.contains("USDC"));
        assert!(table.contains("not loaded"));
    }

    #[test]
    fn test_risk_report_orders_and_sizes() {
        let close_factors = HashMap::from([("WETH".to_string(), Some(0.5))]);
        let report = render_risk_report(&accounts(), &close_factors, &SizingConfig::default());

        assert!(report.starts_with("2 accounts: 1 liquidatable"));
        let under = report.find("0xunder").unwrap();
        let safe = report.find("0xsafe").unwrap();
        assert!(under < safe);
        assert!(report.contains("max $500.00 = 5.0000 units at cf 0.50"));
    }

    #[test]
    fn test_missing_close_factor_is_flagged_or_rejected() {
        let assumed = render_risk_report(&accounts(), &HashMap::new(), &SizingConfig::default());
        assert!(assumed.contains("(assumed)"));

        let reject = SizingConfig {
            missing_close_factor: MissingCloseFactor::Reject,
            ..SizingConfig::default()
        };
        let rejected = render_risk_report(&accounts(), &HashMap::new(), &reject);
        assert!(rejected.contains("not sized"));
    }
}
