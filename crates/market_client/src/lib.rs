//! HTTP market-data client.
//!
//! Reads one market per request from
//! `{base_url}/markets/{network}/{pool}/{asset}`. The service answers with a
//! `MarketInfo` object, `null`, or a 404 when it does not list the market.

pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use common::config::ApiConfig;
use common::{Error, MarketInfo, NetworkId, Result};
use market_data::MarketInfoFetcher;
use tracing::debug;

pub use rate_limit::RequestLimiter;

/// Error bodies are cut to this many characters before logging.
const MAX_ERROR_BODY: usize = 500;

/// Market-data API client with connection pooling and a shared request budget.
#[derive(Debug, Clone)]
pub struct HttpMarketFetcher {
    client: reqwest::Client,
    base_url: String,
    limiter: RequestLimiter,
}

impl HttpMarketFetcher {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lending-monitor/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            limiter: RequestLimiter::per_second(cfg.requests_per_sec),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn market_url(&self, network_id: &NetworkId, pool_id: &str, asset_id: &str) -> String {
        format!(
            "{}/markets/{}/{}/{}",
            self.base_url, network_id, pool_id, asset_id
        )
    }
}

#[async_trait]
impl MarketInfoFetcher for HttpMarketFetcher {
    async fn fetch(
        &self,
        pool_id: &str,
        asset_id: &str,
        network_id: &NetworkId,
    ) -> Result<Option<MarketInfo>> {
        let url = self.market_url(network_id, pool_id, asset_id);
        self.limiter.wait().await;
        debug!("Fetching market: {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("reading body from {} failed: {}", url, e)))?;

        parse_market_response(status, &body)
    }
}

/// Map a raw response to the fetcher contract.
fn parse_market_response(status: u16, body: &str) -> Result<Option<MarketInfo>> {
    match status {
        404 => Ok(None),
        200..=299 => {
            if body.trim().is_empty() {
                return Ok(None);
            }
            Ok(serde_json::from_str::<Option<MarketInfo>>(body)?)
        }
        _ => {
            let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
            Err(Error::Http(format!("market API returned {}: {}", status, excerpt)))
        }
    }
}
