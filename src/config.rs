//! Configuration loader: merges .env, config.toml and environment variables.

use common::config::MonitorConfig;
use common::{Error, NetworkId};
use std::path::Path;

const BPS_MAX: u32 = 10_000;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &MonitorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.api.base_url.trim().is_empty() {
        issues.push("api.base_url must not be empty".into());
    }
    if config.api.timeout_secs == 0 {
        issues.push("api.timeout_secs must be > 0".into());
    }
    if config.api.requests_per_sec == 0 {
        issues.push("api.requests_per_sec must be > 0".into());
    }

    if config.cache.ttl_secs == 0 {
        issues.push("cache.ttl_secs must be > 0".into());
    }
    if config.cache.max_size == 0 {
        issues.push("cache.max_size must be > 0".into());
    }

    if config.fetch.throttle_secs == 0 {
        issues.push("fetch.throttle_secs must be > 0".into());
    }
    if config.fetch.refresh_interval_secs == 0 {
        issues.push("fetch.refresh_interval_secs must be > 0".into());
    }

    let cf = config.risk.default_close_factor;
    if !(cf > 0.0 && cf <= 1.0) {
        issues.push("risk.default_close_factor must be in (0,1]".into());
    }

    match config.active_network() {
        None => issues.push(format!(
            "network {} is not listed under [[networks]]",
            config.network
        )),
        Some(net) => {
            if net.pool_id.trim().is_empty() {
                issues.push(format!("networks.{}.pool_id must not be empty", net.id));
            }
            if net.tokens.is_empty() {
                issues.push(format!("networks.{} must list at least one token", net.id));
            }
        }
    }

    for net in &config.networks {
        for token in &net.tokens {
            if token.asset_id.trim().is_empty() {
                issues.push(format!("networks.{}: token {} has no asset_id", net.id, token.symbol));
            }
            if let Some(params) = token.params {
                if params.reserve_factor_bps > BPS_MAX {
                    issues.push(format!(
                        "networks.{}: {} reserve_factor_bps must be <= {}",
                        net.id, token.symbol, BPS_MAX
                    ));
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `LENDING_*` overrides. `lookup` is `std::env::var` outside tests.
fn apply_env_overrides<F>(config: &mut MonitorConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("LENDING_API_URL") {
        config.api.base_url = url.trim().to_string();
    }
    if let Some(network) = lookup("LENDING_NETWORK") {
        config.network = NetworkId::new(network.trim());
    }
    if let Some(raw) = lookup("LENDING_THROTTLE_SECS") {
        config.fetch.throttle_secs = parse_positive_u64(&raw, "LENDING_THROTTLE_SECS")?;
    }
    if let Some(raw) = lookup("LENDING_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_positive_u64(&raw, "LENDING_CACHE_TTL_SECS")?;
    }
    Ok(())
}

/// Load monitor configuration from `config_path` (if present) and the
/// environment. `network` from the command line wins over both.
pub fn load_config(config_path: &Path, network: Option<&str>) -> Result<MonitorConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, replaced by the config file if it exists.
    let mut config = MonitorConfig::default();
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 3. Environment overrides.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    // 4. Command line.
    if let Some(network) = network {
        config.network = NetworkId::new(network);
    }

    validate_config(&config)?;

    Ok(config)
}
