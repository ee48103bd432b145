//! Unified error type for the lending monitor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Market data fetch failed: {0}")]
    Fetch(String),

    #[error("No market data available for {0}")]
    NoData(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Close factor missing for {0}; refusing to assume a default")]
    MissingCloseFactor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
