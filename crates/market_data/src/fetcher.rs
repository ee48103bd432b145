//! Market-data source seam.

use async_trait::async_trait;
use common::{MarketInfo, NetworkId, Result};

/// Fetches raw market fields for one asset in one pool.
///
/// `Ok(None)` means the source has no data for the market, which is
/// distinct from a failed request (`Err`). Implementations own their
/// timeouts; the orchestrator waits for whatever they return.
#[async_trait]
pub trait MarketInfoFetcher: Send + Sync {
    async fn fetch(
        &self,
        pool_id: &str,
        asset_id: &str,
        network_id: &NetworkId,
    ) -> Result<Option<MarketInfo>>;
}
